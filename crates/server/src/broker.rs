use std::time::{Duration, Instant as StdInstant};

use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use shared::domain::Feedback;
use tracing::{debug, info, warn};

use crate::relay::{FeedbackSink, InboundMessage, RelayHandle};

const REQUEST_CAPACITY: usize = 32;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Publishes feedback tokens on the fixed feedback topic, QoS 0, not
/// retained.
#[derive(Clone)]
pub struct MqttFeedback {
    client: AsyncClient,
    topic: String,
}

impl MqttFeedback {
    pub fn new(client: AsyncClient, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }
}

impl FeedbackSink for MqttFeedback {
    fn publish(&self, feedback: Feedback) {
        match self
            .client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, feedback.as_str())
        {
            Ok(()) => info!(topic = %self.topic, %feedback, "feedback published"),
            Err(error) => warn!(topic = %self.topic, %feedback, %error, "feedback publish failed"),
        }
    }
}

pub fn connect(options: rumqttc::MqttOptions) -> (AsyncClient, EventLoop) {
    AsyncClient::new(options, REQUEST_CAPACITY)
}

/// Drives the broker connection: subscribes to the command topic on every
/// (re)connect and forwards each publish into the relay. Returns only when
/// the relay has stopped.
pub async fn run_ingress(
    mut eventloop: EventLoop,
    client: AsyncClient,
    command_topic: String,
    relay: RelayHandle,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(topic = %command_topic, "broker connected, subscribing");
                if let Err(error) = client.try_subscribe(command_topic.as_str(), QoS::AtLeastOnce)
                {
                    warn!(topic = %command_topic, %error, "subscribe request failed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = inbound_message(
                    &publish.topic,
                    &publish.payload,
                    publish.retain,
                    tokio::time::Instant::now().into_std(),
                );
                if message.retained {
                    info!(
                        topic = %message.topic,
                        payload = %message.payload,
                        "retained message received"
                    );
                } else {
                    debug!(topic = %message.topic, payload = %message.payload, "message received");
                }
                if relay.submit(message).await.is_err() {
                    warn!("relay stopped, leaving broker loop");
                    return;
                }
            }
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "broker connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Payloads are plain text; invalid UTF-8 is replaced rather than rejected.
pub fn inbound_message(
    topic: &str,
    payload: &[u8],
    retained: bool,
    received_at: StdInstant,
) -> InboundMessage {
    InboundMessage {
        topic: topic.to_string(),
        payload: String::from_utf8_lossy(payload).into_owned(),
        retained,
        received_at,
    }
}
