pub mod domain;
pub mod nats;
pub mod postgres;
pub mod proto;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEventManagementApi;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEventStreamReader;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEventStreamWriter;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamConsumer;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamPublisher;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockMessageAck;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockPullConsumer;
