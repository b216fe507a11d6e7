use std::collections::HashMap;

use crate::chat::{strip_bot_marker, BotMarker};
use crate::message::{Message, MessageKind, RawMessage};

const SYSTEM_AUTHOR_NAME: &str = "FunPay";
const SUPPORT_BADGES: [&str; 3] = ["поддержка", "підтримка", "support"];
const MODERATION_BADGES: [&str; 3] = ["модерация", "модерація", "moderation"];
const ARBITRATION_BADGES: [&str; 3] = ["арбитраж", "арбітраж", "arbitration"];
const AUTOREPLY_LABELS: [&str; 3] = ["автоответ", "автовідповідь", "auto-reply"];
const BOT_IMAGE_FRAGMENT: &str = "funpay_cardinal";
const LEGACY_BOT_IMAGE_NAME: &str = "funpay_vertex_image.png";

/// Account and chat facts the enrichment stage needs.
pub struct EnrichContext<'a> {
    pub account_id: i64,
    pub account_username: &'a str,
    pub chat_name: Option<&'a str>,
    pub counterpart_id: Option<i64>,
    pub classify: &'a (dyn Fn(&str) -> MessageKind + Send + Sync),
}

#[derive(Default)]
struct AuthorDirectory {
    names: HashMap<i64, String>,
    badges: HashMap<i64, Option<String>>,
}

impl AuthorDirectory {
    fn learn(raws: &[RawMessage]) -> Self {
        let mut directory = Self::default();
        for raw in raws {
            let Some(name) = raw.author_name.as_deref() else {
                continue;
            };
            directory
                .names
                .entry(raw.author_id)
                .or_insert_with(|| name.to_string());
            directory
                .badges
                .entry(raw.author_id)
                .or_insert_with(|| raw.badge.clone());
        }
        directory
    }
}

/// Turns one chat's raw history into fully populated messages.
///
/// Author names and badges are only rendered on the first message of a run, so
/// the whole batch is scanned before any message is built. Output order follows
/// input order.
pub fn enrich_history(raws: Vec<RawMessage>, ctx: &EnrichContext<'_>) -> Vec<Message> {
    let directory = AuthorDirectory::learn(&raws);
    let counterpart_id = ctx.counterpart_id.or_else(|| {
        raws.iter()
            .map(|raw| raw.author_id)
            .find(|author| *author != 0 && *author != ctx.account_id)
    });
    let chat_name = ctx
        .chat_name
        .map(str::to_string)
        .or_else(|| counterpart_id.and_then(|id| directory.names.get(&id).cloned()));

    raws.into_iter()
        .map(|raw| enrich_one(raw, ctx, &directory, counterpart_id, chat_name.as_deref()))
        .collect()
}

fn enrich_one(
    raw: RawMessage,
    ctx: &EnrichContext<'_>,
    directory: &AuthorDirectory,
    counterpart_id: Option<i64>,
    chat_name: Option<&str>,
) -> Message {
    let kind = if raw.author_id == 0 {
        raw.text
            .as_deref()
            .map(|text| (ctx.classify)(text))
            .unwrap_or_default()
    } else {
        MessageKind::NonSystem
    };

    let mut by_bot = false;
    let mut by_vertex = false;
    let text = match raw.text.as_deref() {
        Some(text) => {
            let (stripped, marker) = strip_bot_marker(text);
            match marker {
                BotMarker::Bot => {
                    by_bot = true;
                    Some(stripped.to_string())
                }
                BotMarker::Legacy if raw.author_id == ctx.account_id => {
                    by_bot = true;
                    Some(stripped.to_string())
                }
                _ => Some(text.to_string()),
            }
        }
        None => {
            if let Some(image_name) = raw.image_name.as_deref() {
                if image_name.to_lowercase().contains(BOT_IMAGE_FRAGMENT) {
                    by_bot = true;
                } else if image_name == LEGACY_BOT_IMAGE_NAME {
                    by_vertex = true;
                }
            }
            None
        }
    };

    let author = if raw.author_id == 0 {
        Some(SYSTEM_AUTHOR_NAME.to_string())
    } else if raw.author_id == ctx.account_id {
        Some(ctx.account_username.to_string())
    } else {
        directory.names.get(&raw.author_id).cloned()
    };

    let mut badge = directory.badges.get(&raw.author_id).cloned().flatten();
    let is_employee = badge.is_some();
    let badge_matches = |labels: &[&str]| {
        badge
            .as_deref()
            .is_some_and(|value| labels.contains(&value))
    };
    let is_support = badge_matches(&SUPPORT_BADGES);
    let is_moderation = badge_matches(&MODERATION_BADGES);
    let is_arbitration = badge_matches(&ARBITRATION_BADGES);
    let is_autoreply = raw
        .default_label
        .as_deref()
        .is_some_and(|label| AUTOREPLY_LABELS.contains(&label));
    if badge.is_none() {
        badge = raw.default_label.clone();
    }

    let (initiator_id, initiator_username) = if kind.is_system() {
        raw.user_links
            .first()
            .map(|(id, name)| (Some(*id), Some(name.clone())))
            .unwrap_or((None, None))
    } else {
        (None, None)
    };
    let (i_am_buyer, i_am_seller) = resolve_roles(kind, ctx.account_id, &raw.user_links);

    Message {
        id: raw.id,
        chat_id: raw.chat_id,
        chat_name: chat_name.map(str::to_string),
        counterpart_id,
        author_id: raw.author_id,
        author,
        text,
        image_link: raw.image_link,
        image_name: raw.image_name,
        kind,
        by_bot,
        by_vertex,
        badge,
        is_employee,
        is_support,
        is_moderation,
        is_arbitration,
        is_autoreply,
        initiator_id,
        initiator_username,
        i_am_buyer,
        i_am_seller,
        html: raw.html,
    }
}

/// Returns `(i_am_buyer, i_am_seller)` for a system message.
fn resolve_roles(
    kind: MessageKind,
    account_id: i64,
    user_links: &[(i64, String)],
) -> (Option<bool>, Option<bool>) {
    let Some((initiator_id, _)) = user_links.first() else {
        return (None, None);
    };
    let initiator_is_me = *initiator_id == account_id;
    match kind {
        MessageKind::OrderPurchased
        | MessageKind::OrderConfirmed
        | MessageKind::NewFeedback
        | MessageKind::FeedbackChanged
        | MessageKind::FeedbackDeleted => (Some(initiator_is_me), Some(!initiator_is_me)),
        MessageKind::NewFeedbackAnswer
        | MessageKind::FeedbackAnswerChanged
        | MessageKind::FeedbackAnswerDeleted
        | MessageKind::Refund => (Some(!initiator_is_me), Some(initiator_is_me)),
        MessageKind::OrderConfirmedByAdmin | MessageKind::RefundByAdmin
            if user_links.len() > 1 =>
        {
            let last_is_me = user_links
                .last()
                .is_some_and(|(id, _)| *id == account_id);
            if kind == MessageKind::OrderConfirmedByAdmin {
                (Some(!last_is_me), Some(last_is_me))
            } else {
                (Some(last_is_me), Some(!last_is_me))
            }
        }
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: i64 = 100;
    const BUYER: i64 = 200;

    fn classify(text: &str) -> MessageKind {
        if text.contains("paid for order") {
            MessageKind::OrderPurchased
        } else if text.contains("refunded the buyer") {
            MessageKind::Refund
        } else if text.contains("administrator") {
            MessageKind::OrderConfirmedByAdmin
        } else {
            MessageKind::NonSystem
        }
    }

    fn context() -> EnrichContext<'static> {
        EnrichContext {
            account_id: ME,
            account_username: "seller",
            chat_name: None,
            counterpart_id: None,
            classify: &classify,
        }
    }

    fn raw(id: i64, author_id: i64, text: &str) -> RawMessage {
        RawMessage {
            id,
            chat_id: 7,
            author_id,
            text: Some(text.to_string()),
            ..RawMessage::default()
        }
    }

    #[test]
    fn unit_author_names_and_badges_propagate_to_headerless_messages() {
        let mut first = raw(1, BUYER, "hi");
        first.author_name = Some("buyer".to_string());
        first.badge = Some("support".to_string());
        let second = raw(2, BUYER, "still there?");

        let messages = enrich_history(vec![first, second], &context());
        assert_eq!(messages[1].author.as_deref(), Some("buyer"));
        assert!(messages[1].is_employee);
        assert!(messages[1].is_support);
        assert_eq!(messages[1].counterpart_id, Some(BUYER));
        assert_eq!(messages[1].chat_name.as_deref(), Some("buyer"));
    }

    #[test]
    fn unit_bot_marker_is_stripped_and_flagged() {
        let messages = enrich_history(vec![raw(5, ME, "\u{2061}thanks")], &context());
        assert!(messages[0].by_bot);
        assert_eq!(messages[0].text.as_deref(), Some("thanks"));
        assert_eq!(messages[0].author.as_deref(), Some("seller"));
    }

    #[test]
    fn unit_legacy_marker_from_counterpart_is_kept() {
        let messages = enrich_history(vec![raw(5, BUYER, "\u{2064}hey")], &context());
        assert!(!messages[0].by_bot);
        assert_eq!(messages[0].text.as_deref(), Some("\u{2064}hey"));
    }

    #[test]
    fn unit_bot_image_names_set_flags() {
        let mut image = RawMessage {
            id: 9,
            chat_id: 7,
            author_id: ME,
            image_name: Some("FunPay_Cardinal_image.png".to_string()),
            image_link: Some("https://sfunpay.com/s/chat/img.png".to_string()),
            ..RawMessage::default()
        };
        let messages = enrich_history(vec![image.clone()], &context());
        assert!(messages[0].by_bot);
        assert_eq!(messages[0].display_text(), image.image_link.as_deref());

        image.image_name = Some("funpay_vertex_image.png".to_string());
        let messages = enrich_history(vec![image], &context());
        assert!(messages[0].by_vertex);
    }

    #[test]
    fn functional_system_messages_resolve_initiator_and_roles() {
        let mut purchase = raw(10, 0, "The buyer buyer has paid for order #ABCD1234.");
        purchase.user_links = vec![(BUYER, "buyer".to_string())];
        let mut refund = raw(11, 0, "The seller seller has refunded the buyer buyer on order #ABCD1234.");
        refund.user_links = vec![(ME, "seller".to_string()), (BUYER, "buyer".to_string())];
        let mut admin = raw(12, 0, "The administrator admin has confirmed that order");
        admin.user_links = vec![(1, "admin".to_string()), (ME, "seller".to_string())];

        let messages = enrich_history(vec![purchase, refund, admin], &context());
        assert_eq!(messages[0].kind, MessageKind::OrderPurchased);
        assert_eq!(messages[0].author.as_deref(), Some("FunPay"));
        assert_eq!(messages[0].initiator_id, Some(BUYER));
        assert_eq!(messages[0].i_am_seller, Some(true));
        assert_eq!(messages[0].i_am_buyer, Some(false));

        assert_eq!(messages[1].kind, MessageKind::Refund);
        assert_eq!(messages[1].i_am_seller, Some(true));

        assert_eq!(messages[2].kind, MessageKind::OrderConfirmedByAdmin);
        assert_eq!(messages[2].i_am_seller, Some(true));
        assert_eq!(messages[2].i_am_buyer, Some(false));
    }

    #[test]
    fn unit_autoreply_label_becomes_badge_without_employee_flag() {
        let mut message = raw(3, ME, "auto");
        message.author_name = Some("seller".to_string());
        message.default_label = Some("auto-reply".to_string());
        let messages = enrich_history(vec![message], &context());
        assert!(messages[0].is_autoreply);
        assert!(!messages[0].is_employee);
        assert_eq!(messages[0].badge.as_deref(), Some("auto-reply"));
    }
}
