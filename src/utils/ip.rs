//! IP 地址处理工具
//!
//! 访问日志只记录原始客户端 IP 文本；提取顺序为
//! X-Forwarded-For 首跳 -> X-Real-IP -> 连接对端地址，
//! 记录前做一次规范化（去 zone、解开 IPv4-mapped）。

use std::net::Ipv4Addr;

use actix_web::HttpRequest;

/// 规范化 IP 文本
///
/// - 去掉 IPv6 的 zone 后缀（`fe80::1%eth0` -> `fe80::1`）
/// - 解开 IPv4-mapped IPv6（`::ffff:1.2.3.4` -> `1.2.3.4`）
pub fn normalize_ip(raw: &str) -> String {
    let no_zone = raw.split('%').next().unwrap_or(raw);
    if let Some(v4) = no_zone.strip_prefix("::ffff:")
        && v4.parse::<Ipv4Addr>().is_ok()
    {
        return v4.to_string();
    }
    no_zone.to_string()
}

/// 从 HeaderMap 提取转发的 IP（X-Forwarded-For 或 X-Real-IP）
pub fn extract_forwarded_ip_from_headers(
    headers: &actix_web::http::header::HeaderMap,
) -> Option<String> {
    // 优先 X-Forwarded-For（取第一个，即原始客户端 IP）
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            // 其次 X-Real-IP
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// 从 HttpRequest 提取规范化后的客户端 IP
pub fn extract_client_ip(req: &HttpRequest) -> String {
    let raw = extract_forwarded_ip_from_headers(req.headers())
        .or_else(|| req.connection_info().peer_addr().map(String::from))
        .unwrap_or_else(|| "unknown".to_string());
    normalize_ip(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_lowercase(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_normalize_ip() {
        assert_eq!(normalize_ip("8.8.8.8"), "8.8.8.8");
        assert_eq!(normalize_ip("::ffff:192.168.0.1"), "192.168.0.1");
        assert_eq!(normalize_ip("fe80::1%eth0"), "fe80::1");
        assert_eq!(normalize_ip("2001:db8::1"), "2001:db8::1");
        // ::ffff: 后不是合法 IPv4 时原样保留
        assert_eq!(normalize_ip("::ffff:abcd"), "::ffff:abcd");
    }

    #[test]
    fn test_forwarded_ip_first_hop() {
        let map = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(
            extract_forwarded_ip_from_headers(&map),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_forwarded_ip_fallback_to_real_ip() {
        let map = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(
            extract_forwarded_ip_from_headers(&map),
            Some("198.51.100.2".to_string())
        );
    }

    #[test]
    fn test_forwarded_ip_empty_headers() {
        assert_eq!(extract_forwarded_ip_from_headers(&HeaderMap::new()), None);

        let map = headers(&[("x-forwarded-for", "  ")]);
        assert_eq!(extract_forwarded_ip_from_headers(&map), None);
    }
}
