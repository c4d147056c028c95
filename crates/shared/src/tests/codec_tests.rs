use super::*;
use crate::{
    domain::{JobStatus, Mode},
    protocol::{InitRequest, RunForm, StatusNotice},
};

fn sample_run_form() -> RunForm {
    RunForm {
        spiders: vec!["s1".to_string(), "s2".to_string()],
        keyins: "term1|term2".to_string(),
        thread_num: 20,
        limit: 0,
        docker_cap: 50,
        pausetime: 300,
        proxy_minute: 0,
        out_type: "csv".to_string(),
        success_inherit: true,
        failure_inherit: false,
    }
}

#[test]
fn run_request_encodes_numbers_as_decimal_strings() {
    let frame = encode(&ClientRequest::Run(sample_run_form())).expect("encode");
    let value: Value = serde_json::from_str(&frame).expect("json");

    assert_eq!(value["operate"], "run");
    assert_eq!(value["spiders"], serde_json::json!(["s1", "s2"]));
    assert_eq!(value["threadNum"], "20");
    assert_eq!(value["dockerCap"], "50");
    assert_eq!(value["outType"], "csv");
    assert_eq!(value["successInherit"], true);
}

#[test]
fn unit_requests_carry_only_the_operate_tag() {
    assert_eq!(
        encode(&ClientRequest::PauseRecover).expect("encode"),
        r#"{"operate":"pauseRecover"}"#
    );
    assert_eq!(
        encode(&ClientRequest::Stop).expect("encode"),
        r#"{"operate":"stop"}"#
    );
}

#[test]
fn offline_init_request_omits_port_and_ip() {
    let frame = encode(&ClientRequest::Init(InitRequest {
        mode: Mode::Offline,
        port: None,
        ip: None,
    }))
    .expect("encode");
    assert_eq!(frame, r#"{"operate":"init","mode":0}"#);
}

#[test]
fn decodes_legacy_run_frame_from_browser_console() {
    let frame = r#"{"operate":"run","spiders":["s1","s2"],"keywords":"term1|term2","threadNum":"20","maxPage":"0","dockerCap":"50","baseSleeptime":"300","randomSleepPeriod":"300","output":"csv"}"#;
    let ClientRequest::Run(form) = decode_request(frame).expect("decode") else {
        panic!("expected run request");
    };
    assert_eq!(form.spiders, vec!["s1", "s2"]);
    assert_eq!(form.keyins, "term1|term2");
    assert_eq!(form.thread_num, 20);
    assert_eq!(form.docker_cap, 50);
    assert_eq!(form.out_type, "csv");
}

#[test]
fn decodes_init_push_with_ordered_spider_menu() {
    let frame = r#"{"operate":"init","initiative":true,"mode":1,"title":"Session","status":0,"spiderMenu":{"s2":{"name":"B","description":"second"},"s1":{"name":"A","description":"d"}}}"#;
    let ServerPush::Init(push) = decode_push(frame).expect("decode") else {
        panic!("expected init push");
    };
    assert!(push.initiative);
    assert_eq!(push.mode, Mode::Server);
    assert_eq!(push.title, "Session");
    assert_eq!(push.status, Some(JobStatus::Stop));
    let ids: Vec<_> = push.spider_menu.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s1"]);
    assert_eq!(push.spider_menu[1].name, "A");
    assert!(!push.spider_menu[1].selected);
}

#[test]
fn spider_menu_array_uses_names_as_ids() {
    let frame = r#"{"operate":"init","mode":0,"spiderMenu":[{"name":"Baidu","description":"a"},{"name":"Wiki","description":"b"}]}"#;
    let ServerPush::Init(push) = decode_push(frame).expect("decode") else {
        panic!("expected init push");
    };
    assert!(push.initiative, "absent initiative defaults to true");
    let ids: Vec<_> = push.spider_menu.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["Baidu", "Wiki"]);
    assert_eq!(push.spider_menu[1].description, "b");
}

#[test]
fn decodes_status_notice_acknowledgements() {
    assert_eq!(
        decode_push(r#"{"operate":"run","mode":0,"status":1}"#).expect("decode"),
        ServerPush::Run(StatusNotice::new(Mode::Offline, JobStatus::Run))
    );
    assert_eq!(
        decode_push(r#"{"operate":"exit"}"#).expect("decode"),
        ServerPush::Exit(StatusNotice::default())
    );
}

#[test]
fn invalid_json_is_malformed() {
    assert!(matches!(
        decode_push("{not json"),
        Err(DecodeError::Malformed(_))
    ));
    assert!(matches!(
        decode_push("[1,2,3]"),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn missing_or_unrecognised_operate_is_reported() {
    assert_eq!(
        decode_push(r#"{"mode":0,"status":-2}"#),
        Err(DecodeError::UnknownOperate(None))
    );
    assert_eq!(
        decode_push(r#"{"operate":"goon"}"#),
        Err(DecodeError::UnknownOperate(Some("goon".to_string())))
    );
    assert_eq!(
        decode_push(r#"{"operate":7}"#),
        Err(DecodeError::UnknownOperate(Some("7".to_string())))
    );
}

#[test]
fn known_operate_with_bad_fields_is_malformed() {
    assert!(matches!(
        decode_push(r#"{"operate":"run","status":"running"}"#),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn log_lines_are_decoded_lossily() {
    assert_eq!(decode_log_line(b"fetch url 1"), "fetch url 1");
    assert_eq!(decode_log_line(&[b'o', b'k', 0xff]), "ok\u{fffd}");
}
