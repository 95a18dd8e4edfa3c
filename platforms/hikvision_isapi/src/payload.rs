use common::{MixedTargetPayload, NotificationPayload, PushError, PushProfile};
use serde::Serialize;

pub const XML_CONTENT_TYPE: &str = "application/xml; charset=UTF-8";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

const ISAPI_NAMESPACE: &str = "http://www.isapi.org/ver20/XMLSchema";
const INDENT: &str = "    ";

/// 完整的 HTTP 主机通知配置（所有字段均已填充）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub id: i32,
    pub url: String,
    pub protocol_type: String,
    pub parameter_format_type: String,
    pub addressing_format_type: String,
    pub ip_address: String,
    pub port_no: i32,
    pub user_name: String,
    pub http_authentication_method: String,
    pub detection_up_load_pictures_type: String,
    pub video_upload_enabled: bool,
    pub heartbeat: i32,
    pub event_mode: String,
    pub enabled: bool,
    pub check_response_enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            id: 1,
            url: "/events/camera/hxml".to_string(),
            protocol_type: "HTTP".to_string(),
            parameter_format_type: "XML".to_string(),
            addressing_format_type: "ipaddress".to_string(),
            ip_address: "10.141.0.104".to_string(),
            port_no: 8081,
            user_name: String::new(),
            http_authentication_method: "none".to_string(),
            detection_up_load_pictures_type: "all".to_string(),
            video_upload_enabled: false,
            heartbeat: 0,
            event_mode: "all".to_string(),
            enabled: true,
            check_response_enabled: true,
        }
    }
}

impl NotificationSettings {
    /// 用默认值补全未设置（或空白）的字段
    pub fn normalize(payload: Option<&NotificationPayload>) -> Self {
        let defaults = Self::default();
        let Some(p) = payload else {
            return defaults;
        };
        Self {
            id: p.id.unwrap_or(defaults.id),
            url: or_default(&p.url, defaults.url),
            protocol_type: or_default(&p.protocol_type, defaults.protocol_type),
            parameter_format_type: or_default(&p.parameter_format_type, defaults.parameter_format_type),
            addressing_format_type: or_default(
                &p.addressing_format_type,
                defaults.addressing_format_type,
            ),
            ip_address: or_default(&p.ip_address, defaults.ip_address),
            port_no: p.port_no.unwrap_or(defaults.port_no),
            // An explicit blank user name is kept as-is.
            user_name: p.user_name.clone().unwrap_or_default(),
            http_authentication_method: or_default(
                &p.http_authentication_method,
                defaults.http_authentication_method,
            ),
            detection_up_load_pictures_type: or_default(
                &p.detection_up_load_pictures_type,
                defaults.detection_up_load_pictures_type,
            ),
            video_upload_enabled: p.video_upload_enabled.unwrap_or(defaults.video_upload_enabled),
            heartbeat: p.heartbeat.unwrap_or(defaults.heartbeat),
            event_mode: or_default(&p.event_mode, defaults.event_mode),
            enabled: p.enabled.unwrap_or(defaults.enabled),
            check_response_enabled: p
                .check_response_enabled
                .unwrap_or(defaults.check_response_enabled),
        }
    }

    /// 序列化为 `HttpHostNotification` XML 文档
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<HttpHostNotification version=\"2.0\" xmlns=\"{ISAPI_NAMESPACE}\">\n"
        ));
        push_tag(&mut xml, 1, "id", &self.id.to_string());
        push_tag(&mut xml, 1, "url", &self.url);
        push_tag(&mut xml, 1, "protocolType", &self.protocol_type);
        push_tag(&mut xml, 1, "parameterFormatType", &self.parameter_format_type);
        push_tag(&mut xml, 1, "addressingFormatType", &self.addressing_format_type);
        push_tag(&mut xml, 1, "ipAddress", &self.ip_address);
        push_tag(&mut xml, 1, "portNo", &self.port_no.to_string());
        push_tag(&mut xml, 1, "userName", &self.user_name);
        push_tag(&mut xml, 1, "httpAuthenticationMethod", &self.http_authentication_method);

        push_open(&mut xml, 1, "ANPR");
        push_tag(
            &mut xml,
            2,
            "detectionUpLoadPicturesType",
            &self.detection_up_load_pictures_type,
        );
        push_tag(&mut xml, 2, "videoUploadEnabled", &self.video_upload_enabled.to_string());
        push_close(&mut xml, 1, "ANPR");

        push_open(&mut xml, 1, "SubscribeEvent");
        push_tag(&mut xml, 2, "heartbeat", &self.heartbeat.to_string());
        push_tag(&mut xml, 2, "eventMode", &self.event_mode);
        push_close(&mut xml, 1, "SubscribeEvent");

        push_tag(&mut xml, 1, "enabled", &self.enabled.to_string());
        push_tag(&mut xml, 1, "checkResponseEnabled", &self.check_response_enabled.to_string());
        xml.push_str("</HttpHostNotification>\n");
        xml
    }
}

impl PushProfile for NotificationSettings {
    fn name(&self) -> &'static str {
        "httpHostNotification"
    }

    fn content_type(&self) -> &'static str {
        XML_CONTENT_TYPE
    }

    fn render(&self) -> Result<String, PushError> {
        Ok(self.to_xml())
    }
}

/// 完整的混合目标检测配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixedTargetSettings {
    pub enabled: bool,
    pub binary_upload: bool,
    /// 仅在启用二进制上传时才可能为 true
    pub convert_to_bmp: bool,
}

impl MixedTargetSettings {
    pub fn normalize(payload: Option<&MixedTargetPayload>) -> Self {
        let Some(p) = payload else {
            return Self::default();
        };
        let binary_upload = p.binary_upload.unwrap_or(false);
        Self {
            enabled: p.enabled.unwrap_or(false),
            binary_upload,
            convert_to_bmp: binary_upload && p.convert_to_bmp.unwrap_or(false),
        }
    }

    /// 序列化为 `MixedTargetDetection` JSON 文档
    pub fn to_json(&self) -> Result<String, PushError> {
        let body = MixedTargetBody {
            detection: MixedTargetDetection {
                enabled: self.enabled,
                types_detection: [RuleType {
                    rule_mode: "human",
                    enabled: false,
                }],
                mef: Toggle { enabled: false },
                binary_upload: self.binary_upload,
                convert_to_bmp: self.convert_to_bmp,
            },
        };
        serde_json::to_string(&body).map_err(|e| PushError::PayloadEncoding(e.to_string()))
    }
}

impl PushProfile for MixedTargetSettings {
    fn name(&self) -> &'static str {
        "mixedTargetDetection"
    }

    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn render(&self) -> Result<String, PushError> {
        self.to_json()
    }
}

// --- Mixed target wire structs (field order is the wire order) ---

#[derive(Serialize)]
struct MixedTargetBody {
    #[serde(rename = "MixedTargetDetection")]
    detection: MixedTargetDetection,
}

#[derive(Serialize)]
struct MixedTargetDetection {
    enabled: bool,
    // Fixed rule set, not driven by the typed settings.
    #[serde(rename = "TypesDetection")]
    types_detection: [RuleType; 1],
    #[serde(rename = "MEF")]
    mef: Toggle,
    #[serde(rename = "isSupportBinaryPicUp")]
    binary_upload: bool,
    #[serde(rename = "convertBinToBmpEnabled")]
    convert_to_bmp: bool,
}

#[derive(Serialize)]
struct RuleType {
    #[serde(rename = "ruleMode")]
    rule_mode: &'static str,
    enabled: bool,
}

#[derive(Serialize)]
struct Toggle {
    enabled: bool,
}

fn or_default(value: &Option<String>, default: String) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default,
    }
}

fn push_open(xml: &mut String, level: usize, tag: &str) {
    xml.push_str(&INDENT.repeat(level));
    xml.push_str(&format!("<{tag}>\n"));
}

fn push_close(xml: &mut String, level: usize, tag: &str) {
    xml.push_str(&INDENT.repeat(level));
    xml.push_str(&format!("</{tag}>\n"));
}

fn push_tag(xml: &mut String, level: usize, tag: &str, value: &str) {
    xml.push_str(&INDENT.repeat(level));
    xml.push_str(&format!("<{tag}>{}</{tag}>\n", escape_xml(value)));
}

/// 转义 XML 文本中的 `& < > " '`
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_xml_document() {
        let xml = NotificationSettings::normalize(None).to_xml();
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<HttpHostNotification version=\"2.0\" xmlns=\"http://www.isapi.org/ver20/XMLSchema\">\n\
\x20   <id>1</id>\n\
\x20   <url>/events/camera/hxml</url>\n\
\x20   <protocolType>HTTP</protocolType>\n\
\x20   <parameterFormatType>XML</parameterFormatType>\n\
\x20   <addressingFormatType>ipaddress</addressingFormatType>\n\
\x20   <ipAddress>10.141.0.104</ipAddress>\n\
\x20   <portNo>8081</portNo>\n\
\x20   <userName></userName>\n\
\x20   <httpAuthenticationMethod>none</httpAuthenticationMethod>\n\
\x20   <ANPR>\n\
\x20       <detectionUpLoadPicturesType>all</detectionUpLoadPicturesType>\n\
\x20       <videoUploadEnabled>false</videoUploadEnabled>\n\
\x20   </ANPR>\n\
\x20   <SubscribeEvent>\n\
\x20       <heartbeat>0</heartbeat>\n\
\x20       <eventMode>all</eventMode>\n\
\x20   </SubscribeEvent>\n\
\x20   <enabled>true</enabled>\n\
\x20   <checkResponseEnabled>true</checkResponseEnabled>\n\
</HttpHostNotification>\n";
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_empty_payload_matches_defaults() {
        let settings = NotificationSettings::normalize(Some(&NotificationPayload::default()));
        assert_eq!(settings, NotificationSettings::default());
        assert!(settings.enabled);
        assert!(settings.check_response_enabled);
        assert!(!settings.video_upload_enabled);
        assert_eq!(settings.heartbeat, 0);
        assert_eq!(settings.port_no, 8081);
    }

    #[test]
    fn test_blank_strings_fall_back_and_values_are_trimmed() {
        let payload = NotificationPayload {
            ip_address: Some("  ".into()),
            event_mode: Some(" changed ".into()),
            user_name: Some(" ops ".into()),
            port_no: Some(9000),
            enabled: Some(false),
            ..Default::default()
        };
        let settings = NotificationSettings::normalize(Some(&payload));
        assert_eq!(settings.ip_address, "10.141.0.104");
        assert_eq!(settings.event_mode, "changed");
        assert_eq!(settings.user_name, " ops ");
        assert_eq!(settings.port_no, 9000);
        assert!(!settings.enabled);
    }

    #[test]
    fn test_xml_is_deterministic() {
        let payload = NotificationPayload {
            url: Some("/hook".into()),
            heartbeat: Some(30),
            ..Default::default()
        };
        let a = NotificationSettings::normalize(Some(&payload)).to_xml();
        let b = NotificationSettings::normalize(Some(&payload.clone())).to_xml();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert!(a.contains("<heartbeat>30</heartbeat>"));
    }

    #[test]
    fn test_xml_escaping() {
        let payload = NotificationPayload {
            user_name: Some("Tom & Jerry \"2\"".into()),
            url: Some("/a?b=<c>&d='e'".into()),
            ..Default::default()
        };
        let xml = NotificationSettings::normalize(Some(&payload)).to_xml();
        assert!(xml.contains("<userName>Tom &amp; Jerry &quot;2&quot;</userName>"));
        assert!(xml.contains("<url>/a?b=&lt;c&gt;&amp;d=&apos;e&apos;</url>"));
        assert!(!xml.contains("Tom & Jerry"));
        assert!(!xml.contains("\"2\""));
    }

    #[test]
    fn test_mixed_target_json_literal() {
        let settings = MixedTargetSettings::normalize(Some(&MixedTargetPayload {
            enabled: Some(true),
            binary_upload: Some(true),
            convert_to_bmp: Some(true),
        }));
        assert_eq!(
            settings.to_json().unwrap(),
            r#"{"MixedTargetDetection":{"enabled":true,"TypesDetection":[{"ruleMode":"human","enabled":false}],"MEF":{"enabled":false},"isSupportBinaryPicUp":true,"convertBinToBmpEnabled":true}}"#
        );
    }

    #[test]
    fn test_bmp_conversion_requires_binary_upload() {
        let settings = MixedTargetSettings::normalize(Some(&MixedTargetPayload {
            enabled: Some(true),
            binary_upload: Some(false),
            convert_to_bmp: Some(true),
        }));
        assert!(!settings.convert_to_bmp);
        assert!(settings.to_json().unwrap().ends_with(
            r#""isSupportBinaryPicUp":false,"convertBinToBmpEnabled":false}}"#
        ));

        let defaults = MixedTargetSettings::normalize(None);
        assert_eq!(defaults, MixedTargetSettings::default());
        assert!(!defaults.enabled);
    }

    #[test]
    fn test_profiles_report_content_types() {
        assert_eq!(NotificationSettings::default().content_type(), XML_CONTENT_TYPE);
        assert_eq!(MixedTargetSettings::default().content_type(), JSON_CONTENT_TYPE);
        assert!(MixedTargetSettings::default().render().unwrap().starts_with('{'));
    }
}
