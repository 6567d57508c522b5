/// Every topic subscribed on connect.
pub const TOPICS: [&str; 50] = [
    "/legacy_web",
    "/webrtc",
    "/rtc_multi",
    "/onevc",
    "/br_sr",
    "/sr_res",
    "/t_ms",
    "/thread_typing",
    "/orca_typing_notifications",
    "/notify_disconnect",
    "/orca_presence",
    "/legacy_web_mtouch",
    "/t_rtc_multi",
    "/ls_foreground_state",
    "/ls_resp",
    "/inbox",
    "/mercury",
    "/messaging_events",
    "/orca_message_notifications",
    "/pp",
    "/webrtc_response",
    "/delivery_receipts",
    "/read_receipts",
    "/notifications_sync",
    "/fbns_msg",
    "/fbns_reg_resp",
    "/fbns_unreg_resp",
    "/fbns_connect",
    "/fbns_disconnect",
    "/fbns_ping",
    "/fbns_pong",
    "/mobile_requests",
    "/webrtc_stats",
    "/webrtc_relay",
    "/t_other",
    "/push_sync",
    "/presence",
    "/user_settings",
    "/orca_presence_updates",
    "/messenger_sync_create_queue",
    "/messenger_sync_get_diffs",
    "/messenger_sync_ack",
    "/capabilities",
    "/thread_reads",
    "/thread_activity",
    "/e2e_handshake",
    "/e2e_message",
    "/sync_sequence_id",
    "/sync_settings",
    "/sync_contacts",
];

pub const CREATE_QUEUE: &str = "/messenger_sync_create_queue";
pub const GET_DIFFS: &str = "/messenger_sync_get_diffs";
pub const FOREGROUND_STATE: &str = "/foreground_state";
pub const SET_CLIENT_SETTINGS: &str = "/set_client_settings";
