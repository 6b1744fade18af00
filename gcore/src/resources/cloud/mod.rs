//! Cloud resources. Everything here lives in a project and region, and
//! most mutations go through the task API.

mod floating_ip;
mod inference;
mod instance;
mod keypair;
mod load_balancer;
mod network;

pub use floating_ip::FloatingIpResource;
pub use inference::InferenceDeploymentResource;
pub use instance::InstanceResource;
pub use keypair::KeypairResource;
pub use load_balancer::LoadBalancerResource;
pub use network::NetworkResource;
