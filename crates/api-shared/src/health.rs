use crate::wire::HealthRes;

/// Health check answered by the REST API's `/health` route.
pub struct HealthService;

impl HealthService {
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "closeout is alive".into(),
        }
    }
}
