//! 路径模式解析。
//!
//! `/users/:id/posts/:post_id` 按 `/` 切分并丢弃空段，得到
//! `["users", ":id", "posts", ":post_id"]`；以 `:` 开头的段是具名参数，
//! 其位置为段序号（从零开始）。
//!
//! 不做参数名去重，也不识别通配符或正则段：`*rest` 按普通字面量段处理。

/// 具名参数及其段位置。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathParam {
    pub name: String,
    pub position: usize,
}

/// 解析后的路径模式。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<String>,
    params: Vec<PathParam>,
}

impl PathPattern {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 参数按从左到右的顺序排列。
    pub fn params(&self) -> &[PathParam] {
        &self.params
    }

    pub fn is_static(&self) -> bool {
        self.params.is_empty()
    }
}

/// 解析路径字符串。
pub fn parse_path(path: &str) -> PathPattern {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();

    let params = segments
        .iter()
        .enumerate()
        .filter_map(|(position, segment)| {
            segment.strip_prefix(':').map(|name| PathParam {
                name: name.to_owned(),
                position,
            })
        })
        .collect();

    PathPattern { segments, params }
}
