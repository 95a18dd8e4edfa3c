//! HTTP Digest 认证（RFC 2617 / RFC 7616）

use std::borrow::Cow;
use std::collections::HashMap;

use base64::prelude::*;
use common::{Credentials, PushError};
use md5::{Digest, Md5};
use sha2::Sha256;
use url::Url;

/// 单次质询/应答只发送一次请求，计数器固定
pub const NONCE_COUNT: &str = "00000001";

const SCHEME_PREFIX: &str = "Digest ";

/// 摘要哈希算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// 根据质询中的 `algorithm` 取值选择哈希函数（`SHA-256`、`SHA-256-sess` 等，其余均为 MD5）
    pub fn from_token(token: &str) -> Self {
        if token.to_ascii_uppercase().contains("SHA-256") {
            HashAlgorithm::Sha256
        } else {
            HashAlgorithm::Md5
        }
    }

    fn hex(self, charset: Charset, parts: &[&str]) -> String {
        match self {
            HashAlgorithm::Md5 => hex_digest::<Md5>(charset, parts),
            HashAlgorithm::Sha256 => hex_digest::<Sha256>(charset, parts),
        }
    }
}

/// 摘要输入的字符编码
///
/// 默认按 ISO-8859-1 编码；只有质询中声明 `charset=UTF-8`（RFC 7616）时才按 UTF-8。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Latin1,
    Utf8,
}

impl Charset {
    fn from_token(token: Option<&str>) -> Self {
        match token {
            Some(t) if t.trim().eq_ignore_ascii_case("utf-8") => Charset::Utf8,
            _ => Charset::Latin1,
        }
    }

    fn encode(self, text: &str) -> Cow<'_, [u8]> {
        if self == Charset::Utf8 || text.is_ascii() {
            return Cow::Borrowed(text.as_bytes());
        }
        // Characters outside ISO-8859-1 are replaced with '?'.
        Cow::Owned(text.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect())
    }
}

fn hex_digest<D: Digest>(charset: Charset, parts: &[&str]) -> String {
    let mut h = D::new();
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            h.update(b":");
        }
        h.update(charset.encode(p));
    }
    hex::encode(h.finalize())
}

/// 从所有 `WWW-Authenticate` 头中找出 Digest 质询
pub fn find_digest_challenge(values: &[String]) -> Option<&str> {
    values
        .iter()
        .map(String::as_str)
        .find(|v| has_digest_scheme(v))
}

fn has_digest_scheme(value: &str) -> bool {
    value
        .get(..SCHEME_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SCHEME_PREFIX))
}

/// 解析质询属性，键统一为小写。
///
/// 支持带反斜杠转义的引号字符串和不带引号的 token；没有 `=` 的项会被忽略。
pub fn parse_attributes(challenge: &str) -> HashMap<String, String> {
    let mut body = challenge.trim();
    if has_digest_scheme(body) {
        body = &body[SCHEME_PREFIX.len()..];
    }

    let chars: Vec<char> = body.chars().collect();
    let mut out = HashMap::new();
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && (chars[i] == ',' || chars[i].is_whitespace()) {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let key_start = i;
        while i < chars.len() && chars[i] != '=' && chars[i] != ',' {
            i += 1;
        }
        let key = chars[key_start..i]
            .iter()
            .collect::<String>()
            .trim()
            .to_ascii_lowercase();
        if i >= chars.len() || chars[i] != '=' {
            continue;
        }
        i += 1;

        let value = if chars.get(i) == Some(&'"') {
            i += 1;
            let mut value = String::new();
            while i < chars.len() {
                let c = chars[i];
                i += 1;
                if c == '\\' && i < chars.len() {
                    value.push(chars[i]);
                    i += 1;
                    continue;
                }
                if c == '"' {
                    break;
                }
                value.push(c);
            }
            value
        } else {
            let value_start = i;
            while i < chars.len() && chars[i] != ',' {
                i += 1;
            }
            chars[value_start..i].iter().collect::<String>().trim().to_string()
        };

        if !key.is_empty() {
            out.insert(key, value);
        }
    }
    out
}

/// 从 `qop` 列表中选择保护级别：优先 `auth`，否则取第一个
pub fn choose_qop(value: Option<&str>) -> Option<String> {
    let mut first = None;
    for part in value?.split(',') {
        let p = part.trim().to_ascii_lowercase();
        if p.is_empty() {
            continue;
        }
        if p == "auth" {
            return Some(p);
        }
        if first.is_none() {
            first = Some(p);
        }
    }
    first
}

/// 解析后的 Digest 质询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    /// 原样回显到 `Authorization` 头中
    pub algorithm: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub charset: Charset,
}

impl DigestChallenge {
    pub fn parse(challenge: &str) -> Result<Self, PushError> {
        let mut attrs = parse_attributes(challenge);
        let (Some(realm), Some(nonce)) = (attrs.remove("realm"), attrs.remove("nonce")) else {
            return Err(PushError::DigestChallengeInvalid(
                "missing realm or nonce".to_string(),
            ));
        };
        Ok(Self {
            realm,
            nonce,
            algorithm: attrs.remove("algorithm").unwrap_or_else(|| "MD5".to_string()),
            qop: choose_qop(attrs.get("qop").map(String::as_str)),
            opaque: attrs.remove("opaque").filter(|o| !o.trim().is_empty()),
            charset: Charset::from_token(attrs.get("charset").map(String::as_str)),
        })
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::from_token(&self.algorithm)
    }

    fn is_session(&self) -> bool {
        self.algorithm.to_ascii_lowercase().ends_with("-sess")
    }

    /// 计算 `response` 摘要
    pub fn response(&self, method: &str, uri: &str, creds: &Credentials, cnonce: &str) -> String {
        let algo = self.hash_algorithm();
        let cs = self.charset;
        let mut ha1 = algo.hex(cs, &[&creds.username, &self.realm, &creds.password]);
        if self.is_session() {
            ha1 = algo.hex(cs, &[&ha1, &self.nonce, cnonce]);
        }
        let ha2 = algo.hex(cs, &[method, uri]);
        match &self.qop {
            Some(qop) => algo.hex(cs, &[&ha1, &self.nonce, NONCE_COUNT, cnonce, qop, &ha2]),
            None => algo.hex(cs, &[&ha1, &self.nonce, &ha2]),
        }
    }

    /// 构造 `Authorization: Digest ...` 头的值
    pub fn authorization(
        &self,
        method: &str,
        uri: &str,
        creds: &Credentials,
        cnonce: &str,
    ) -> String {
        let response = self.response(method, uri, creds, cnonce);
        let mut fields = vec![
            quoted("username", &creds.username),
            quoted("realm", &self.realm),
            quoted("nonce", &self.nonce),
            quoted("uri", uri),
            quoted("response", &response),
            format!("algorithm={}", self.algorithm),
        ];
        if let Some(opaque) = &self.opaque {
            fields.push(quoted("opaque", opaque));
        }
        if let Some(qop) = &self.qop {
            fields.push(format!("qop={qop}"));
            fields.push(format!("nc={NONCE_COUNT}"));
            fields.push(quoted("cnonce", cnonce));
        }
        format!("{SCHEME_PREFIX}{}", fields.join(", "))
    }
}

fn quoted(key: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{key}=\"{escaped}\"")
}

/// 生成客户端随机数：12 字节随机数据的 base64 编码
pub fn generate_cnonce() -> String {
    BASE64_STANDARD.encode(rand::random::<[u8; 12]>())
}

/// 摘要计算所用的 URI：路径加上查询串
pub fn digest_uri(url: &Url) -> String {
    let mut uri = url.path().to_string();
    if uri.is_empty() {
        uri.push('/');
    }
    if let Some(query) = url.query().filter(|q| !q.trim().is_empty()) {
        uri.push('?');
        uri.push_str(query);
    }
    uri
}
