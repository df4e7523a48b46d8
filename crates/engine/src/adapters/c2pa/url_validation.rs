use std::net::{IpAddr, ToSocketAddrs};

use url::{Host, Url};

use crate::domain::error::{EngineError, EngineResult};

fn is_blocked(ip: IpAddr) -> bool {
  match ip {
    IpAddr::V4(v4) => {
      v4.is_private()
        || v4.is_loopback()
        || v4.is_link_local()
        || v4.is_broadcast()
        || v4.is_documentation()
        || v4.is_unspecified()
    }
    IpAddr::V6(v6) => {
      v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local() || v6.is_unspecified() || v6.is_multicast()
    }
  }
}

/// Check a URL the engine will contact on the caller's behalf (a timestamp
/// authority). HTTPS only unless `allow_http`; private, loopback and
/// link-local hosts are refused, including domains resolving to them.
pub fn validate_external_http_url(url_str: &str, allow_http: bool) -> EngineResult<()> {
  let url = Url::parse(url_str).map_err(|_| EngineError::Config(format!("invalid URL: {url_str}")))?;
  match url.scheme() {
    "https" => {}
    "http" if allow_http => {}
    "http" => return Err(EngineError::Config(format!("HTTP URLs are not allowed: {url_str}"))),
    _ => return Err(EngineError::Config("unsupported URL scheme".into())),
  }

  let host = url.host().ok_or_else(|| EngineError::Config("URL missing host".into()))?;
  let literal = match host {
    Host::Ipv4(a) => Some(IpAddr::V4(a)),
    Host::Ipv6(a) => Some(IpAddr::V6(a)),
    Host::Domain(_) => None,
  };
  if literal.is_some_and(is_blocked) {
    return Err(EngineError::Config("URL host is not allowed (private/link-local/loopback)".into()));
  }

  // Domains resolving to private addresses are refused too; unresolvable ones pass
  if let (Some(domain), Some(port)) = (url.host_str(), url.port_or_known_default()) {
    if let Ok(addrs) = (domain, port).to_socket_addrs() {
      if addrs.map(|a| a.ip()).any(is_blocked) {
        return Err(EngineError::Config("URL resolves to a disallowed private/loopback address".into()));
      }
    }
  }
  Ok(())
}
