use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "termgate=info,termgate_terminal=info,tower_http=info";
const VERBOSE_FILTER: &str = "termgate=debug,termgate_terminal=debug,tower_http=debug";

/// Install the gateway's log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
