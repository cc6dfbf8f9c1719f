mod common;

use serde_json::{Map, Value, json};

use parley_store::StoreError;
use parley_types::{ATTACHMENTS_HEADER, DelMessage, FileDef, Message, Range, Subscription, Topic, Uid, User};

use common::{Harness, TestMedia, harness};

fn setup_topic(h: &Harness, name: &str) -> Uid {
    let mut user = User::default();
    h.store.users().create(&mut user, None).unwrap();
    let mut topic = Topic {
        name: name.into(),
        owner: user.id,
        ..Default::default()
    };
    h.store.topics().create(&mut topic, user.id, None).unwrap();
    h.adapter.clear_calls();
    user.id
}

fn message(topic: &str, from: Uid, head: Map<String, Value>) -> Message {
    Message {
        topic: topic.into(),
        from,
        head,
        content: json!("hello"),
        ..Default::default()
    }
}

fn upload(h: &Harness, user: Uid) -> Uid {
    let mut fd = FileDef {
        user,
        mime_type: "image/png".into(),
        ..Default::default()
    };
    h.store.files().start_upload(&mut fd).unwrap();
    fd.id
}

#[test]
fn save_assigns_sequence_ids() {
    let h = harness();
    let user = setup_topic(&h, "grpSeq");

    let mut first = message("grpSeq", user, Map::new());
    let mut second = message("grpSeq", user, Map::new());
    h.store.messages().save(&mut first).unwrap();
    h.store.messages().save(&mut second).unwrap();

    assert_eq!(first.seq_id, 1);
    assert_eq!(second.seq_id, 2);
    assert!(!first.id.is_zero());
    assert_ne!(first.id, second.id);
    assert_eq!(
        h.adapter.calls(),
        vec![
            "topic_update_on_message",
            "message_save",
            "topic_update_on_message",
            "message_save"
        ]
    );
}

#[test]
fn save_fails_before_storing_when_counter_fails() {
    let h = harness();
    let user = setup_topic(&h, "grpCounter");
    h.adapter.fail("topic_update_on_message");

    let mut msg = message("grpCounter", user, Map::new());
    assert!(h.store.messages().save(&mut msg).is_err());
    assert_eq!(h.adapter.message_count("grpCounter"), 0);
}

#[test]
fn attachments_are_rewritten_to_file_ids_and_linked() {
    let h = harness();
    let user = setup_topic(&h, "grpFiles");
    let fid = upload(&h, user);
    h.adapter.clear_calls();

    let mut head = Map::new();
    head.insert(
        ATTACHMENTS_HEADER.into(),
        json!([TestMedia::url(fid), "https://elsewhere.example/x.png"]),
    );
    let mut msg = message("grpFiles", user, head);
    h.store.messages().save(&mut msg).unwrap();

    assert_eq!(msg.head[ATTACHMENTS_HEADER], json!([fid.to_string()]));
    assert_eq!(
        h.adapter.calls(),
        vec!["topic_update_on_message", "message_save", "message_attachments"]
    );
    assert_eq!(h.adapter.links_of(fid), vec![msg.id]);
}

#[test]
fn unresolved_attachments_are_removed_from_header() {
    let h = harness();
    let user = setup_topic(&h, "grpNoFiles");

    let mut head = Map::new();
    head.insert(ATTACHMENTS_HEADER.into(), json!(["https://elsewhere.example/x.png"]));
    head.insert("mime".into(), json!("text/x-drafty"));
    let mut msg = message("grpNoFiles", user, head);
    h.store.messages().save(&mut msg).unwrap();

    assert!(!msg.head.contains_key(ATTACHMENTS_HEADER));
    assert_eq!(msg.head["mime"], json!("text/x-drafty"));
    assert!(!h.adapter.calls().contains(&"message_attachments"));

    let stored = h.store.messages().get_all("grpNoFiles", user, None).unwrap();
    assert!(!stored[0].head.contains_key(ATTACHMENTS_HEADER));
}

#[test]
fn malformed_attachment_header_is_removed() {
    let h = harness();
    let user = setup_topic(&h, "grpOdd");

    let mut head = Map::new();
    head.insert(ATTACHMENTS_HEADER.into(), json!("not-a-list"));
    let mut msg = message("grpOdd", user, head);
    h.store.messages().save(&mut msg).unwrap();

    assert!(!msg.head.contains_key(ATTACHMENTS_HEADER));
}

#[test]
fn link_failure_keeps_message() {
    let h = harness();
    let user = setup_topic(&h, "grpLinks");
    let fid = upload(&h, user);
    h.adapter.fail("message_attachments");

    let mut head = Map::new();
    head.insert(ATTACHMENTS_HEADER.into(), json!([TestMedia::url(fid)]));
    let mut msg = message("grpLinks", user, head);
    h.store.messages().save(&mut msg).unwrap();

    assert_eq!(h.adapter.message_count("grpLinks"), 1);
    assert!(h.adapter.links_of(fid).is_empty());
}

fn save_n(h: &Harness, topic: &str, from: Uid, n: usize) {
    for _ in 0..n {
        let mut msg = message(topic, from, Map::new());
        h.store.messages().save(&mut msg).unwrap();
    }
}

#[test]
fn hard_delete_updates_topic_and_every_subscription() {
    let h = harness();
    let owner = setup_topic(&h, "grpDel");
    let mut guest = User::default();
    h.store.users().create(&mut guest, None).unwrap();
    h.store
        .subs()
        .create(&mut [Subscription {
            topic: "grpDel".into(),
            user: guest.id,
            ..Default::default()
        }])
        .unwrap();
    save_n(&h, "grpDel", owner, 5);
    h.adapter.clear_calls();

    h.store
        .messages()
        .delete_list("grpDel", 1, None, vec![Range::new(1, 3)])
        .unwrap();

    assert_eq!(
        h.adapter.calls(),
        vec!["message_delete_list", "topic_update", "subs_update"]
    );
    assert_eq!(h.adapter.message_count("grpDel"), 2);
    assert_eq!(h.store.topics().get("grpDel").unwrap().unwrap().del_id, 1);
    for user in [owner, guest.id] {
        assert_eq!(h.store.subs().get("grpDel", user).unwrap().unwrap().del_id, 1);
    }
}

#[test]
fn soft_delete_touches_only_requesting_subscription() {
    let h = harness();
    let owner = setup_topic(&h, "grpSoft");
    let mut guest = User::default();
    h.store.users().create(&mut guest, None).unwrap();
    h.store
        .subs()
        .create(&mut [Subscription {
            topic: "grpSoft".into(),
            user: guest.id,
            ..Default::default()
        }])
        .unwrap();
    save_n(&h, "grpSoft", owner, 3);

    h.store
        .messages()
        .delete_list("grpSoft", 1, Some(guest.id), vec![Range::single(2)])
        .unwrap();

    assert_eq!(h.adapter.message_count("grpSoft"), 3);
    assert_eq!(h.store.subs().get("grpSoft", guest.id).unwrap().unwrap().del_id, 1);
    assert_eq!(h.store.subs().get("grpSoft", owner).unwrap().unwrap().del_id, 0);
    assert_eq!(h.store.messages().get_all("grpSoft", guest.id, None).unwrap().len(), 2);
    assert_eq!(h.store.messages().get_all("grpSoft", owner, None).unwrap().len(), 3);
}

#[test]
fn zero_del_id_removes_everything_without_bookkeeping() {
    let h = harness();
    let owner = setup_topic(&h, "grpWipe");
    save_n(&h, "grpWipe", owner, 3);
    h.adapter.clear_calls();

    h.store.messages().delete_list("grpWipe", 0, None, Vec::new()).unwrap();

    assert_eq!(h.adapter.calls(), vec!["message_delete_list"]);
    assert_eq!(h.adapter.message_count("grpWipe"), 0);
}

#[test]
fn delete_list_stops_when_topic_update_fails() {
    let h = harness();
    let owner = setup_topic(&h, "grpHalf");
    save_n(&h, "grpHalf", owner, 2);
    h.adapter.clear_calls();
    h.adapter.fail("topic_update");

    let err = h
        .store
        .messages()
        .delete_list("grpHalf", 1, None, vec![Range::single(1)])
        .unwrap_err();

    assert!(matches!(err, StoreError::Backend(_)));
    assert_eq!(h.adapter.calls(), vec!["message_delete_list", "topic_update"]);
}

#[test]
fn deleted_ranges_are_merged_with_max_del_id() {
    let h = harness();
    let user = setup_topic(&h, "grpRanges");

    for (del_id, ranges) in [
        (1, vec![Range::new(1, 3)]),
        (2, vec![Range::new(2, 5), Range::new(8, 9)]),
        (3, vec![Range::single(6)]),
    ] {
        h.adapter.insert_del_message(DelMessage {
            topic: "grpRanges".into(),
            del_id,
            seq_id_ranges: ranges,
            ..Default::default()
        });
    }

    let (ranges, max_del_id) = h.store.messages().get_deleted("grpRanges", user, None).unwrap();
    assert_eq!(ranges, vec![Range::new(1, 6), Range::new(8, 9)]);
    assert_eq!(max_del_id, 3);
}

#[test]
fn max_del_id_counts_records_without_ranges() {
    let h = harness();
    let user = setup_topic(&h, "grpEmpty");
    h.adapter.insert_del_message(DelMessage {
        topic: "grpEmpty".into(),
        del_id: 4,
        ..Default::default()
    });

    let (ranges, max_del_id) = h.store.messages().get_deleted("grpEmpty", user, None).unwrap();
    assert!(ranges.is_empty());
    assert_eq!(max_del_id, 4);
}

#[test]
fn other_users_soft_deletes_are_not_reported() {
    let h = harness();
    let user = setup_topic(&h, "grpMine");
    let stranger = h.store.get_uid().unwrap();
    h.adapter.insert_del_message(DelMessage {
        topic: "grpMine".into(),
        deleted_for: Some(stranger),
        del_id: 2,
        seq_id_ranges: vec![Range::single(1)],
        ..Default::default()
    });

    let (ranges, max_del_id) = h.store.messages().get_deleted("grpMine", user, None).unwrap();
    assert!(ranges.is_empty());
    assert_eq!(max_del_id, 0);
}
