//! Learning-mode and replay behavior through the Control Loop, driven one
//! tick at a time.

mod common;

use common::{control_fixture, drain_notices};
use irdeck::hal::{ButtonEvent, IrFrame};
use irdeck::store::{CodeRecord, Protocol};

fn nec_frame() -> IrFrame {
    IrFrame {
        protocol: Protocol::Nec,
        address: 0x1234,
        command: 0x56,
        bits: 32,
    }
}

#[tokio::test]
async fn chat_learn_request_captures_code_to_store_and_cache() {
    let mut fx = control_fixture();

    fx.ctx.request_learning();
    fx.control.tick().await.unwrap();
    assert!(fx.control.learning_active());
    let notices = drain_notices(&mut fx.notices);
    assert!(notices[0].starts_with("LEARNING MODE:"));

    fx.frames.send(nec_frame()).unwrap();
    fx.control.tick().await.unwrap();
    assert!(!fx.control.learning_active());

    let notices = drain_notices(&mut fx.notices);
    assert_eq!(notices[0], "Code received!");
    assert!(notices[1].contains("ID: 1"));
    assert!(notices[1].contains("Protocol: NEC"));
    assert!(notices[1].contains("Addr: 1234"));
    assert!(notices[1].contains("Cmd: 56"));

    // Store line carries decimal fields in file order.
    let content = std::fs::read_to_string(fx.store.codes_path()).unwrap();
    assert_eq!(content, "1 3 4660 86\n");

    let cached = fx.ctx.cache.lock().unwrap().find(1);
    assert_eq!(
        cached,
        Some(CodeRecord {
            id: 1,
            protocol: Protocol::Nec,
            address: 0x1234,
            command: 0x56,
        })
    );

    // The panel is back on the idle menu after the confirmation.
    let menu_shown = fx
        .screen
        .with(|panel| {
            panel
                .rows()
                .iter()
                .any(|row| row.contains("READY FOR CONTROL"))
        })
        .unwrap();
    assert!(menu_shown);
}

#[tokio::test]
async fn double_click_arms_learning_like_the_chat_command() {
    let mut fx = control_fixture();
    fx.buttons.send(ButtonEvent::Clicks(2)).unwrap();
    fx.control.tick().await.unwrap();
    assert!(fx.control.learning_active());
}

#[tokio::test]
async fn frame_with_invalid_bit_width_changes_nothing() {
    let mut fx = control_fixture();

    for bits in [0u16, 65] {
        fx.ctx.request_learning();
        fx.control.tick().await.unwrap();
        drain_notices(&mut fx.notices);

        let mut frame = nec_frame();
        frame.bits = bits;
        fx.frames.send(frame).unwrap();
        fx.control.tick().await.unwrap();

        let notices = drain_notices(&mut fx.notices);
        assert_eq!(notices, vec!["Invalid IR code length!".to_string()]);
        assert!(!fx.control.learning_active());
    }

    assert!(!fx.store.exists().await);
    assert!(fx.ctx.cache.lock().unwrap().is_empty());
    // The rejected frames never consumed an id.
    assert_eq!(fx.store.next_id().await, 1);
}

#[tokio::test]
async fn frame_at_the_64_bit_boundary_is_accepted() {
    let mut fx = control_fixture();
    fx.ctx.request_learning();
    fx.control.tick().await.unwrap();
    drain_notices(&mut fx.notices);

    let mut frame = nec_frame();
    frame.bits = 64;
    fx.frames.send(frame).unwrap();
    fx.control.tick().await.unwrap();

    let notices = drain_notices(&mut fx.notices);
    assert_eq!(notices[0], "Code received!");
    assert!(fx.store.exists().await);
    assert_eq!(fx.ctx.cache.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn replay_dispatches_supported_protocol_from_cache() {
    let mut fx = control_fixture();

    fx.ctx.request_learning();
    fx.control.tick().await.unwrap();
    fx.frames.send(nec_frame()).unwrap();
    fx.control.tick().await.unwrap();
    drain_notices(&mut fx.notices);

    fx.commands.send(1).await.unwrap();
    fx.control.tick().await.unwrap();

    let notices = drain_notices(&mut fx.notices);
    assert!(notices[0].starts_with("Sending code ID: 1"));
    assert_eq!(
        fx.control.transmitter().sent(),
        &[(Protocol::Nec, 0x1234, 0x56)]
    );
}

#[tokio::test]
async fn replay_of_unknown_id_reports_and_sends_nothing() {
    let mut fx = control_fixture();
    fx.commands.send(42).await.unwrap();
    fx.control.tick().await.unwrap();

    let notices = drain_notices(&mut fx.notices);
    assert_eq!(notices, vec!["Code ID 42 not found.".to_string()]);
    assert!(fx.control.transmitter().sent().is_empty());
}

#[tokio::test]
async fn replay_of_unsupported_protocol_is_refused_at_the_dispatch_site() {
    let mut fx = control_fixture();

    // A Panasonic record can be stored and cached but never transmitted.
    let record = CodeRecord {
        id: 1,
        protocol: Protocol::Panasonic,
        address: 0x555A,
        command: 0x3D,
    };
    fx.store.append(&record).await.unwrap();
    fx.ctx.cache.lock().unwrap().push(record);

    fx.commands.send(1).await.unwrap();
    fx.control.tick().await.unwrap();

    let notices = drain_notices(&mut fx.notices);
    assert!(notices[0].starts_with("Sending code ID: 1"));
    assert_eq!(notices[1], "Unsupported protocol");
    assert!(fx.control.transmitter().sent().is_empty());
}
