//! Chat history pages through the message service

mod common;

use chrono::Utc;
use dingilink::core::{
    GroupId, Message, MessageContent, MessageId, MessageRecord, UserId,
};
use dingilink::messaging::InMemoryTransport;
use dingilink::{DingilinkError, GetMessagesInput};

use common::{seeded_store, service_over, text_row};

#[tokio::test]
async fn test_forty_messages_page_in_thirty_and_ten() {
    let store = seeded_store(2, 10, &[1, 2]).await;
    for id in 1..=40 {
        let (sender, recipient) = if id % 2 == 0 { (1, 2) } else { (2, 1) };
        store.insert_record(text_row(id, sender, recipient)).await;
    }
    let service = service_over(store, &InMemoryTransport::new());

    let first = service
        .get_messages(UserId(1), "direct_2", GetMessagesInput::default())
        .await
        .unwrap();
    assert_eq!(first.len(), 30);
    assert!(first.page_info.has_next_page);
    assert!(!first.page_info.has_previous_page);
    let ids: Vec<i64> = first.nodes().map(|message| message.id.get()).collect();
    assert_eq!(ids.first(), Some(&40));
    assert_eq!(ids.last(), Some(&11));
    assert_eq!(first.page_info.end_cursor.as_deref(), Some("11"));

    let second = service
        .get_messages(
            UserId(1),
            "direct_2",
            GetMessagesInput {
                last: None,
                before: first.page_info.end_cursor.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(second.len(), 10);
    assert!(!second.page_info.has_next_page);
    assert!(second.page_info.has_previous_page);
    assert_eq!(second.page_info.end_cursor.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_empty_chat_reports_no_neighbours() {
    let store = seeded_store(3, 10, &[1, 2]).await;
    store.insert_record(text_row(1, 1, 2)).await;
    let service = service_over(store, &InMemoryTransport::new());

    let page = service
        .get_messages(UserId(1), "direct_3", GetMessagesInput::default())
        .await
        .unwrap();
    assert!(page.is_empty());
    assert!(!page.page_info.has_next_page);
    assert!(!page.page_info.has_previous_page);
    assert_eq!(page.page_info.end_cursor, None);
}

#[tokio::test]
async fn test_group_history_needs_membership() {
    let store = seeded_store(3, 10, &[1, 2]).await;
    for id in 1..=3 {
        let mut row = text_row(id, 1, 0);
        row.recipient_id = None;
        row.group_id = Some(GroupId(10));
        store.insert_record(row).await;
    }
    let service = service_over(store, &InMemoryTransport::new());

    let member = service
        .get_messages(UserId(2), "group_10", GetMessagesInput { last: Some(2), before: None })
        .await
        .unwrap();
    assert_eq!(member.len(), 2);
    assert!(member.page_info.has_next_page);

    let outsider = service
        .get_messages(UserId(3), "group_10", GetMessagesInput::default())
        .await
        .unwrap();
    assert!(outsider.is_empty());
}

#[tokio::test]
async fn test_malformed_arguments_are_rejected() {
    let store = seeded_store(2, 10, &[1]).await;
    let service = service_over(store, &InMemoryTransport::new());

    let err = service
        .get_messages(UserId(1), "channel_4", GetMessagesInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DingilinkError::InvalidChatId(_)));

    let err = service
        .get_messages(
            UserId(1),
            "direct_2",
            GetMessagesInput {
                last: None,
                before: Some("yesterday".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DingilinkError::InvalidCursor(_)));

    let err = service
        .get_messages(UserId(1), "direct_2", GetMessagesInput { last: Some(0), before: None })
        .await
        .unwrap_err();
    assert!(matches!(err, DingilinkError::Validation(_)));
}

#[tokio::test]
async fn test_deleted_rows_page_as_deleted() {
    let store = seeded_store(2, 10, &[1]).await;
    store.insert_record(text_row(1, 1, 2)).await;
    store
        .insert_record(MessageRecord {
            message_type: "sticker".to_string(),
            deleted_at: Some(Utc::now()),
            deleted_by: Some(UserId(1)),
            ..text_row(2, 2, 1)
        })
        .await;
    let service = service_over(store, &InMemoryTransport::new());

    let page = service
        .get_messages(UserId(2), "direct_1", GetMessagesInput::default())
        .await
        .unwrap();
    let nodes: Vec<&Message> = page.nodes().collect();
    assert!(matches!(
        nodes[0].content,
        MessageContent::Deleted { deleted_by: Some(UserId(1)), .. }
    ));
    assert_eq!(nodes[1].id, MessageId(1));
    assert_eq!(nodes[1].kind_name(), "text");
}

#[tokio::test]
async fn test_rows_missing_payload_columns_still_page() {
    let store = seeded_store(2, 10, &[1]).await;
    store
        .insert_record(MessageRecord {
            message_type: "image".to_string(),
            text_content: None,
            ..text_row(1, 1, 2)
        })
        .await;
    store
        .insert_record(MessageRecord {
            message_type: "location".to_string(),
            ..text_row(2, 2, 1)
        })
        .await;
    store
        .insert_record(MessageRecord {
            text_content: None,
            ..text_row(3, 1, 2)
        })
        .await;
    let service = service_over(store, &InMemoryTransport::new());

    let page = service
        .get_messages(UserId(1), "direct_2", GetMessagesInput::default())
        .await
        .unwrap();
    let contents: Vec<&MessageContent> = page.nodes().map(|message| &message.content).collect();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0], &MessageContent::Text { body: String::new() });
    assert!(matches!(contents[1], MessageContent::Location { point: None, .. }));
    assert_eq!(
        contents[2],
        &MessageContent::Image { media: None, caption: None }
    );
}

#[test]
fn test_unknown_type_without_deletion_is_invalid() {
    let row = MessageRecord {
        message_type: "sticker".to_string(),
        ..text_row(1, 1, 2)
    };
    assert!(matches!(Message::build(row), Err(DingilinkError::InvalidVariant(_))));
}
