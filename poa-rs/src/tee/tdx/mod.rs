pub mod attester;

use super::TdxMode;

pub const LOCAL_TAPPD_ENDPOINT: &str = "http://localhost:8090";
pub const DOCKER_TAPPD_ENDPOINT: &str = "http://host.docker.internal:8090";
pub const PRODUCTION_TAPPD_ENDPOINT: &str = "http://localhost:8090";

/// Resolve the quote service endpoint for `mode`. Only `Production` takes
/// the simulator override; `Local` and `Docker` are fixed.
pub fn tappd_endpoint(mode: TdxMode, simulator_endpoint: Option<&str>) -> String {
    match mode {
        TdxMode::Local => LOCAL_TAPPD_ENDPOINT.to_owned(),
        TdxMode::Docker => DOCKER_TAPPD_ENDPOINT.to_owned(),
        TdxMode::Production => simulator_endpoint
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(PRODUCTION_TAPPD_ENDPOINT)
            .to_owned(),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(tappd_endpoint(TdxMode::Docker, None), DOCKER_TAPPD_ENDPOINT);
        assert_eq!(
            tappd_endpoint(TdxMode::Production, Some("  ")),
            PRODUCTION_TAPPD_ENDPOINT
        );
        assert_eq!(
            tappd_endpoint(TdxMode::Production, Some("http://10.0.0.2:8090")),
            "http://10.0.0.2:8090"
        );
    }

    #[test]
    fn test_simulator_endpoint_ignored_outside_production() {
        let simulator = Some("http://10.0.0.2:8090");
        assert_eq!(tappd_endpoint(TdxMode::Local, simulator), LOCAL_TAPPD_ENDPOINT);
        assert_eq!(tappd_endpoint(TdxMode::Docker, simulator), DOCKER_TAPPD_ENDPOINT);
    }
}
