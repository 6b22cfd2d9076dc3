//! API request handlers.
//!
//! - `POST /api/v1/cycles`
//! - `GET /api/v1/allocation/latest`, `GET /api/v1/allocation/:cycle`
//! - `GET /api/v1/signals?since=<rfc3339>`
//! - `POST /api/v1/networks/infer`
//! - `GET /api/v1/networks/:network_id`
//! - `GET /api/v1/networks/:network_id/recommendations`
//! - `GET|DELETE /api/v1/networks/jobs/:job_id`
//! - `/health`, `/health/live`, `/health/ready`, `/metrics`

pub mod allocation;
pub mod cycles;
pub mod health;
pub mod metrics;
pub mod network;
pub mod signals;

pub use allocation::*;
pub use cycles::*;
pub use health::*;
pub use metrics::*;
pub use network::*;
pub use signals::*;
