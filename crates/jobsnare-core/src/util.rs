use std::net::IpAddr;
use std::str::FromStr;

use url::{Host, Url};

use crate::error::AppError;

/// Hostname with a leading `www.` removed, lowercased.
///
/// Example: `"https://www.Indeed.com/viewjob?jk=1"` → `"indeed.com"`
pub fn normalize_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Validate a user-supplied job URL.
///
/// Only absolute `http`/`https` URLs with a DNS hostname pass; IP-literal
/// hosts are rejected.
pub fn validate_job_url(url: &str) -> Result<Url, AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidUrl(format!(
                "scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::InvalidUrl("URL has no host".to_string()))?;

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return Err(AppError::InvalidUrl(format!(
            "IP-literal hosts are not allowed: {host}"
        )));
    }

    Ok(parsed)
}

/// Refuse targets whose host is, or resolves to, an internal address.
///
/// IP literals are checked directly; names go through DNS and every
/// resolved address must be public.
pub async fn ensure_public_host(url: &Url) -> Result<(), AppError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidUrl(format!(
            "scheme '{}' is not allowed (only http/https)",
            url.scheme()
        )));
    }

    let resolved: Vec<IpAddr> = match url.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(name)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((name, port))
                .await
                .map_err(|e| AppError::NetworkError(format!("DNS lookup for {name} failed: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        }
        None => return Err(AppError::InvalidUrl("URL has no host".to_string())),
    };

    if resolved.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS lookup for {} returned no addresses",
            url.host_str().unwrap_or_default()
        )));
    }

    match resolved.into_iter().find(|ip| is_internal_address(*ip)) {
        Some(ip) => Err(AppError::InvalidUrl(format!(
            "refusing internal address {ip} for {}",
            url.host_str().unwrap_or_default()
        ))),
        None => Ok(()),
    }
}

/// Loopback, private, link-local, CGNAT, documentation and other
/// non-routable ranges. IPv4-mapped IPv6 addresses are judged as IPv4.
pub fn is_internal_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (a == 100 && (64..128).contains(&b))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_internal_address(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xffc0) == 0xfe80
                || (first & 0xfe00) == 0xfc00
        }
    }
}

/// Read and parse an optional environment variable.
///
/// Unset or empty → `Ok(None)`; unparseable → `ConfigError`.
pub fn env_var<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::ConfigError(format!("{key}={raw}: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("https://www.indeed.com/viewjob?jk=abc"),
            Some("indeed.com".to_string())
        );
        assert_eq!(
            normalize_host("http://Jobs.Lever.co/acme/123"),
            Some("jobs.lever.co".to_string())
        );
        assert_eq!(normalize_host("not a url"), None);
    }

    #[test]
    fn test_validate_accepts_public_hosts() {
        assert!(validate_job_url("https://www.linkedin.com/jobs/view/123").is_ok());
        assert!(validate_job_url("http://boards.greenhouse.io/acme/jobs/1").is_ok());
    }

    #[test]
    fn test_validate_rejects_ip_literals() {
        let err = validate_job_url("http://192.168.1.1/admin").unwrap_err();
        assert!(err.to_string().contains("IP-literal"));
        assert!(validate_job_url("http://[::1]/").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let err = validate_job_url("file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert!(validate_job_url("jobs").is_err());
    }

    #[test]
    fn test_internal_ipv4_ranges() {
        let internal = [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.9",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
        ];
        for ip in internal {
            assert!(is_internal_address(ip.parse().unwrap()), "{ip}");
        }
        assert!(!is_internal_address("8.8.8.8".parse().unwrap()));
        assert!(!is_internal_address("100.128.0.1".parse().unwrap()));
    }

    #[test]
    fn test_internal_ipv6_ranges() {
        for ip in ["::1", "fe80::1", "fd00::5", "::ffff:127.0.0.1", "::ffff:10.0.0.1"] {
            assert!(is_internal_address(ip.parse().unwrap()), "{ip}");
        }
        assert!(!is_internal_address("2001:4860:4860::8888".parse().unwrap()));
        assert!(!is_internal_address("::ffff:8.8.8.8".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_public_host_check_refuses_metadata_endpoint() {
        let url = Url::parse("http://169.254.169.254/latest/meta-data/").unwrap();
        let err = ensure_public_host(&url).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidUrl(_)));
        assert!(err.to_string().contains("internal address"));

        let v6 = Url::parse("http://[::1]:8080/").unwrap();
        assert!(ensure_public_host(&v6).await.is_err());
    }

    #[tokio::test]
    async fn test_public_host_check_resolves_names() {
        let url = Url::parse("http://localhost:9/jobs/1").unwrap();
        let err = ensure_public_host(&url).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_public_host_check_accepts_public_literal() {
        let url = Url::parse("https://8.8.8.8/").unwrap();
        assert!(ensure_public_host(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_public_host_check_rejects_bad_scheme() {
        let url = Url::parse("ftp://example.com/file").unwrap();
        assert!(ensure_public_host(&url).await.is_err());
    }

    #[test]
    fn test_env_var_parsing() {
        // SAFETY: test-local variable names, not read by other tests.
        unsafe {
            std::env::set_var("JOBSNARE_TEST_ENV_OK", "42");
            std::env::set_var("JOBSNARE_TEST_ENV_BAD", "forty-two");
        }
        assert_eq!(env_var::<u64>("JOBSNARE_TEST_ENV_OK").unwrap(), Some(42));
        assert_eq!(env_var::<u64>("JOBSNARE_TEST_ENV_UNSET").unwrap(), None);
        assert!(matches!(
            env_var::<u64>("JOBSNARE_TEST_ENV_BAD"),
            Err(AppError::ConfigError(_))
        ));
    }
}
