//! 全局完美哈希与按方法分桶。
//!
//! # 契约（What）
//! - 只有可分派的路由（路径为字面量且已链接处理函数）参与哈希与分桶；
//! - 全局表以 `METHOD:path` 为键；每个方法桶内的表以路径为键；
//! - 桶按方法首次出现的顺序排列，桶内路由保持原始注册顺序；
//! - 同一 `(method, path)` 出现两次属于致命错误，在构建任何表之前报告。

use std::collections::BTreeMap;

use crate::detect::RouteRecord;
use crate::error::OptimizeError;
use crate::phf::PerfectHashTable;

/// 同一 HTTP 方法下的路由集合。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodBucket {
    pub method: String,
    /// 在路由列表中的下标，按注册顺序。
    pub route_indices: Vec<usize>,
    pub hash_table: PerfectHashTable,
}

impl MethodBucket {
    /// 在桶内查找路径，命中后比对原始路径以排除哈希误命中。
    pub fn resolve(&self, routes: &[RouteRecord], path: &str) -> Option<usize> {
        let index = self.hash_table.lookup(path)?;
        let matches = routes
            .get(index)
            .and_then(RouteRecord::literal_path)
            .is_some_and(|literal| literal == path);
        matches.then_some(index)
    }
}

/// 两级查找：先按方法选桶，再在桶内按路径定位。
pub fn resolve_route(
    buckets: &[MethodBucket],
    routes: &[RouteRecord],
    method: &str,
    path: &str,
) -> Option<usize> {
    buckets
        .iter()
        .find(|bucket| bucket.method == method)?
        .resolve(routes, path)
}

/// 可分派路由的下标，按注册顺序。
pub fn dispatchable(routes: &[RouteRecord]) -> Vec<usize> {
    routes
        .iter()
        .enumerate()
        .filter(|(_, route)| route.is_dispatchable())
        .map(|(index, _)| index)
        .collect()
}

/// 检查可分派路由中是否存在重复的 `(method, path)`。
pub fn check_duplicates(routes: &[RouteRecord]) -> Result<(), OptimizeError> {
    let mut seen: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for index in dispatchable(routes) {
        let route = &routes[index];
        let Some(path) = route.literal_path() else {
            continue;
        };
        if let Some(first) = seen.insert((route.method.as_str(), path), index) {
            return Err(OptimizeError::DuplicateRoute {
                method: route.method.clone(),
                path: path.to_owned(),
                first,
                second: index,
            });
        }
    }
    Ok(())
}

/// 以 `METHOD:path` 为键构建全局完美哈希表。
pub fn build_global_table(routes: &[RouteRecord]) -> Result<PerfectHashTable, OptimizeError> {
    let entries = dispatchable(routes)
        .into_iter()
        .filter_map(|index| routes[index].global_key().map(|key| (key, index)));
    PerfectHashTable::build(entries).map_err(|source| OptimizeError::perfect_hash("global", source))
}

/// 按方法分桶并为每个桶构建路径完美哈希表。
///
/// 不检查重复路由，调用方应先执行 [`check_duplicates`]；未检查时重复路径以
/// [`OptimizeError::PerfectHash`] 的形式失败。
pub fn bucketize(routes: &[RouteRecord]) -> Result<Vec<MethodBucket>, OptimizeError> {
    let mut grouped: Vec<(String, Vec<usize>)> = Vec::new();
    for index in dispatchable(routes) {
        let method = &routes[index].method;
        match grouped.iter_mut().find(|(existing, _)| existing == method) {
            Some((_, indices)) => indices.push(index),
            None => grouped.push((method.clone(), vec![index])),
        }
    }

    grouped
        .into_iter()
        .map(|(method, route_indices)| {
            let entries = route_indices
                .iter()
                .filter_map(|&index| routes[index].literal_path().map(|path| (path, index)));
            let hash_table = PerfectHashTable::build(entries).map_err(|source| {
                OptimizeError::perfect_hash(format!("bucket {method}"), source)
            })?;
            tracing::debug!(
                method = %method,
                routes = route_indices.len(),
                table_size = hash_table.table_size(),
                "method bucket built"
            );
            Ok(MethodBucket {
                method,
                route_indices,
                hash_table,
            })
        })
        .collect()
}
