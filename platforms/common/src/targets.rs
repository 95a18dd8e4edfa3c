use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s,;]+").expect("static separator pattern"))
}

/// 规范化目标列表：拆分、去空白、大小写不敏感去重（保留首次出现的顺序和原始大小写）
pub fn normalize_targets<S: AsRef<str>>(raw_targets: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in raw_targets {
        for token in separators().split(raw.as_ref()) {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                continue;
            }
            if seen.insert(trimmed.to_lowercase()) {
                out.push(trimmed.to_string());
            }
        }
    }
    out
}
