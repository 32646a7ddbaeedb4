//! 线性偏移完美哈希。
//!
//! # 算法（How）
//! - 键哈希为 32 位 FNV-1a；
//! - 表大小从 `n` 起逐一尝试到 `2n`，第一个能让所有键放置成功的大小胜出；
//! - 每个键从偏移 0 起递增探测，槽位为 `(hash + offset) mod table_size`（32 位回绕加法），
//!   取第一个空槽并记录 `hash → offset`；
//! - 查询时用同样的公式一步算出槽位，无需探测。
//!
//! # 前置条件（Contract）
//! 同一张表中的键两两不同，且哈希值两两不同。哈希相同的不同键会让 `hash → offset`
//! 映射产生歧义，构建阶段直接以 [`PerfectHashError::HashCollision`] 拒绝。

use std::collections::BTreeMap;

use thiserror::Error;

pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
pub const FNV_PRIME: u32 = 16_777_619;

/// 32 位 FNV-1a。
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// 完美哈希构建失败的原因。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PerfectHashError {
    #[error("key `{key}` appears more than once")]
    DuplicateKey { key: String },
    #[error("keys `{first}` and `{second}` share FNV-1a hash {hash:#010x}")]
    HashCollision {
        hash: u32,
        first: String,
        second: String,
    },
    #[error("no table size between {keys} and {max_table_size} admits a placement")]
    PlacementFailure { keys: usize, max_table_size: usize },
}

/// 构建完成的完美哈希表。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PerfectHashTable {
    hash_to_offset: BTreeMap<u32, usize>,
    slot_to_route: Vec<Option<usize>>,
    len: usize,
}

impl PerfectHashTable {
    /// 以 `(键, 路由下标)` 构建。
    pub fn build<I, K>(entries: I) -> Result<Self, PerfectHashError>
    where
        I: IntoIterator<Item = (K, usize)>,
        K: AsRef<str>,
    {
        let keyed: Vec<(String, u32, usize)> = entries
            .into_iter()
            .map(|(key, route)| {
                let key = key.as_ref().to_owned();
                let hash = fnv1a32(key.as_bytes());
                (key, hash, route)
            })
            .collect();

        let mut seen: BTreeMap<u32, &str> = BTreeMap::new();
        for (key, hash, _) in &keyed {
            if let Some(previous) = seen.insert(*hash, key) {
                return Err(if previous == key {
                    PerfectHashError::DuplicateKey { key: key.clone() }
                } else {
                    PerfectHashError::HashCollision {
                        hash: *hash,
                        first: previous.to_owned(),
                        second: key.clone(),
                    }
                });
            }
        }

        let keys = keyed.len();
        let max_table_size = keys * 2;
        for table_size in keys..=max_table_size {
            if let Some(table) = place(&keyed, table_size) {
                return Ok(table);
            }
        }
        Err(PerfectHashError::PlacementFailure {
            keys,
            max_table_size,
        })
    }

    pub fn table_size(&self) -> usize {
        self.slot_to_route.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 条目数与表大小之比；空表为 `0.0`。
    pub fn load_factor(&self) -> f64 {
        if self.slot_to_route.is_empty() {
            0.0
        } else {
            self.len as f64 / self.slot_to_route.len() as f64
        }
    }

    pub fn hash_to_offset(&self) -> &BTreeMap<u32, usize> {
        &self.hash_to_offset
    }

    pub fn slot_to_route(&self) -> &[Option<usize>] {
        &self.slot_to_route
    }

    /// 计算键对应的槽位；哈希未登记时返回 `None`。
    ///
    /// 未登记的键也可能与已登记键哈希相同，调用方需自行比对键本身。
    pub fn slot_of(&self, key: &str) -> Option<usize> {
        let hash = fnv1a32(key.as_bytes());
        let offset = *self.hash_to_offset.get(&hash)?;
        Some(slot_for(hash, offset, self.slot_to_route.len()))
    }

    /// 查询键对应的路由下标。
    pub fn lookup(&self, key: &str) -> Option<usize> {
        let slot = self.slot_of(key)?;
        self.slot_to_route.get(slot).copied().flatten()
    }
}

fn slot_for(hash: u32, offset: usize, table_size: usize) -> usize {
    (hash.wrapping_add(offset as u32) % table_size as u32) as usize
}

fn place(keyed: &[(String, u32, usize)], table_size: usize) -> Option<PerfectHashTable> {
    let mut slot_to_route = vec![None; table_size];
    let mut hash_to_offset = BTreeMap::new();

    for (_, hash, route) in keyed {
        let (offset, slot) = (0..table_size).find_map(|offset| {
            let slot = slot_for(*hash, offset, table_size);
            slot_to_route[slot].is_none().then_some((offset, slot))
        })?;
        slot_to_route[slot] = Some(*route);
        hash_to_offset.insert(*hash, offset);
    }

    Some(PerfectHashTable {
        hash_to_offset,
        slot_to_route,
        len: keyed.len(),
    })
}
