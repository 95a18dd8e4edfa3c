/// 响应体最大保留字符数
pub const MAX_RESPONSE_CHARS: usize = 120_000;

/// 截断后追加的标记
pub const TRUNCATION_MARKER: &str = "\n...truncated...";

/// 将响应体限制在 `MAX_RESPONSE_CHARS` 个字符以内
pub fn truncate_body(body: String) -> String {
    match body.char_indices().nth(MAX_RESPONSE_CHARS) {
        Some((cut, _)) => {
            let mut out = body;
            out.truncate(cut);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => body,
    }
}
