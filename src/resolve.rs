use crate::error::ProbeError;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use tracing::debug;

/// Resolves `host` using the system DNS configuration and returns every
/// address found. IP literals pass through without a lookup.
pub(crate) async fn resolve(host: &str) -> Result<Vec<IpAddr>, ProbeError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolver = TokioResolver::builder(TokioConnectionProvider::default())
        .map_err(ProbeError::Resolution)?
        .build();
    let lookup = resolver
        .lookup_ip(host)
        .await
        .map_err(ProbeError::Resolution)?;

    let addrs: Vec<IpAddr> = lookup.iter().collect();
    if addrs.is_empty() {
        return Err(ProbeError::NoAddresses(host.to_string()));
    }
    debug!(host, count = addrs.len(), "resolved target");
    Ok(addrs)
}
