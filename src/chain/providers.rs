use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, Provider};
use url::Url;

use crate::error::PoolError;

pub fn create_provider(rpc_url: &str) -> Result<Arc<Provider<Http>>, PoolError> {
    let url = Url::parse(rpc_url)
        .map_err(|e| PoolError::Configuration(format!("invalid RPC_URL {rpc_url:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(PoolError::Configuration(format!(
                "RPC_URL scheme must be http or https, got {other:?}"
            )))
        }
    }
    // Interval only matters for ethers' own pending-tx polling; receipts are polled explicitly.
    let provider = Provider::new(Http::new(url)).interval(Duration::from_millis(500));
    Ok(Arc::new(provider))
}
