use reactive_stream::{
    Control, ReadyTransport, StreamArgs, SubscriptionService, SubscriptionServiceConfig,
    TransportResolver,
};
use std::sync::Arc;
use stream_test_utils::{CallbackRecorder, ChannelHandle, MockTransport};

pub(crate) fn make_service(name: &str, transport: Arc<MockTransport>) -> SubscriptionService {
    make_service_with(
        SubscriptionServiceConfig::new(name),
        Arc::new(ReadyTransport::new(transport)),
    )
}

pub(crate) fn make_service_with(
    config: SubscriptionServiceConfig,
    resolver: Arc<dyn TransportResolver>,
) -> SubscriptionService {
    SubscriptionService::new(config, resolver).expect("service creation should succeed")
}

pub(crate) fn subscribe_recorded(
    service: &SubscriptionService,
    remote_url: &str,
    params: StreamArgs,
    recorder: &CallbackRecorder,
) -> Control {
    service.subscribe(
        remote_url,
        params,
        recorder.on_data(),
        recorder.on_error(),
        recorder.on_complete(),
    )
}

/// Waits for `count` opened channels and returns the one bound to `target_service`.
#[allow(dead_code)]
pub(crate) async fn channel_to(
    transport: &MockTransport,
    count: usize,
    target_service: &str,
) -> ChannelHandle {
    for index in 0..count {
        let channel = transport.wait_for_channel(index).await;
        if channel.target_service() == target_service {
            return channel;
        }
    }
    panic!("no channel opened towards {target_service}");
}
