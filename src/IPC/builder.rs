use std::time::Duration;

use super::channel::Channel;
use super::cursor::OverrunPolicy;
use super::Schema::Decodable;
use crate::Core::segment::SegmentSource;
use crate::Core::semaphore::{CancelToken, WaitPolicy, DEFAULT_ACQUIRE_TIMEOUT};

pub struct ChannelBuilder {
    name: Option<String>,
    timeout: Duration,
    policy: OverrunPolicy,
    cancel: Option<CancelToken>,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            name: None, // the record's own channel name
            timeout: DEFAULT_ACQUIRE_TIMEOUT,
            policy: OverrunPolicy::Strict,
            cancel: None,
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a segment other than the record's default channel name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: OverrunPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: self.timeout,
            cancel: self.cancel.clone(),
        }
    }

    /// Attach to the producer's POSIX segment. Attach failures leave the channel in its error state.
    pub fn build<T: Decodable>(self) -> Channel<T> {
        let wait = self.wait_policy();
        let name = self.name.as_deref().unwrap_or(T::CHANNEL);
        Channel::attach_with(name, self.policy, wait)
    }

    /// Read from `source` instead of a POSIX segment. The builder's name is ignored.
    pub fn build_from_source<T: Decodable>(self, source: Box<dyn SegmentSource>) -> Channel<T> {
        let wait = self.wait_policy();
        Channel::from_source_with(source, self.policy, wait)
    }
}
