use chrono::{Local, NaiveDateTime};
use funpay_types::{
    strip_bot_marker, AccountProfile, BotMarker, BuyerViewing, ChatSummary, Currency, MessageKind,
    OrderStatus, OrderSummary, RawMessage,
};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::classify::MessageClassifier;
use crate::dates::parse_order_date;
use crate::record::{ChatHistory, FragmentParse, ParseError, RecordParser};

const PREVIEW_LIMIT: usize = 250;

struct Selectors {
    contact_item: Selector,
    contact_message: Selector,
    user_name: Selector,
    user_name_link: Selector,
    success_badge: Selector,
    default_label: Selector,
    message_text: Selector,
    alert: Selector,
    image_link: Selector,
    image: Selector,
    user_links: Selector,
    anchor: Selector,
    order_item: Selector,
    order_id: Selector,
    order_desc: Selector,
    order_price: Selector,
    order_buyer: Selector,
    order_subcategory: Selector,
    order_date: Selector,
    login_form: Selector,
    body: Selector,
    username: Selector,
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|error| ParseError::Pattern(format!("{selector}: {error:?}")))
}

impl Selectors {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            contact_item: compile("a.contact-item")?,
            contact_message: compile("div.contact-item-message")?,
            user_name: compile("div.media-user-name")?,
            user_name_link: compile("a")?,
            success_badge: compile("span.label-success")?,
            default_label: compile("span.label-default")?,
            message_text: compile("div.chat-msg-text")?,
            alert: compile("div[role=\"alert\"]")?,
            image_link: compile("a.chat-img-link")?,
            image: compile("img")?,
            user_links: compile("a[href*=\"/users/\"]")?,
            anchor: compile("a")?,
            order_item: compile("a.tc-item")?,
            order_id: compile("div.tc-order")?,
            order_desc: compile("div.order-desc div")?,
            order_price: compile("div.tc-price")?,
            order_buyer: compile("div.media-user-name span")?,
            order_subcategory: compile("div.text-muted")?,
            order_date: compile("div.tc-date-time")?,
            login_form: compile("div.content-account-login")?,
            body: compile("body")?,
            username: compile("div.user-link-name")?,
        })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector).next().map(element_text)
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|value| value == class)
}

fn parse_int_attr(element: ElementRef<'_>, name: &'static str) -> Result<i64, ParseError> {
    let raw = element.value().attr(name).unwrap_or_default();
    raw.trim()
        .parse()
        .map_err(|_| ParseError::InvalidAttribute {
            name,
            value: raw.to_string(),
        })
}

fn json_i64(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
}

/// Extracts `123` from links such as `https://funpay.com/users/123/`.
fn user_id_from_href(href: &str) -> Option<i64> {
    let (_, tail) = href.split_once("/users/")?;
    tail.split('/').next()?.parse().ok()
}

/// Scraper-backed [`RecordParser`] for the marketplace's markup.
pub struct HtmlRecordParser {
    selectors: Selectors,
    classifier: MessageClassifier,
}

impl HtmlRecordParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            selectors: Selectors::new()?,
            classifier: MessageClassifier::new()?,
        })
    }

    /// Reads the account identity embedded in the landing page.
    pub fn parse_account_profile(&self, html: &str) -> Result<AccountProfile, ParseError> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let username = first_text(root, &self.selectors.username)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(ParseError::LoginPage)?;
        let app_data = root
            .select(&self.selectors.body)
            .next()
            .and_then(|body| body.value().attr("data-app-data"))
            .ok_or(ParseError::MissingElement("body[data-app-data]"))?;
        let app_data: Value = serde_json::from_str(app_data)
            .map_err(|error| ParseError::InvalidData(format!("data-app-data: {error}")))?;
        let id = json_i64(app_data.get("userId"))
            .ok_or(ParseError::MissingElement("data-app-data.userId"))?;
        let csrf_token = app_data
            .get("csrf-token")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingElement("data-app-data.csrf-token"))?
            .to_string();
        let locale = app_data
            .get("locale")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(AccountProfile {
            id,
            username,
            csrf_token,
            locale,
        })
    }

    fn parse_contact(&self, item: ElementRef<'_>) -> FragmentParse<ChatSummary> {
        let Some(preview) = item.select(&self.selectors.contact_message).next() else {
            return FragmentParse::Deleted;
        };
        let id = match parse_int_attr(item, "data-id") {
            Ok(id) => id,
            Err(error) => return FragmentParse::Failed(error),
        };
        let node_msg_id = match parse_int_attr(item, "data-node-msg") {
            Ok(value) => value,
            Err(error) => return FragmentParse::Failed(error),
        };
        let user_msg_id = match parse_int_attr(item, "data-user-msg") {
            Ok(value) => value,
            Err(error) => return FragmentParse::Failed(error),
        };

        let raw_text = element_text(preview);
        let raw_text = raw_text.trim();
        let is_image = ChatSummary::is_image_preview(raw_text);
        let (text, marker) = strip_bot_marker(raw_text);
        let last_message_text: String = text.chars().take(PREVIEW_LIMIT).collect();
        let name = first_text(item, &self.selectors.user_name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        FragmentParse::Parsed(ChatSummary {
            id,
            name,
            last_message_kind: self.classifier.classify(&last_message_text),
            last_message_text,
            is_image,
            node_msg_id,
            user_msg_id,
            unread: has_class(item, "unread"),
            last_by_bot: !is_image && marker == BotMarker::Bot,
            last_by_vertex: !is_image && marker == BotMarker::Legacy,
            html: item.html(),
        })
    }

    fn parse_message(&self, chat_id: i64, entry: &Value) -> Result<RawMessage, ParseError> {
        let id = json_i64(entry.get("id")).ok_or(ParseError::MissingElement("message.id"))?;
        let author_id =
            json_i64(entry.get("author")).ok_or(ParseError::MissingElement("message.author"))?;
        let html = entry
            .get("html")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingElement("message.html"))?;
        let fragment = Html::parse_fragment(&html.replace("<br>", "\n"));
        let root = fragment.root_element();

        let header = root.select(&self.selectors.user_name).next();
        let author_name = header
            .and_then(|header| first_text(header, &self.selectors.user_name_link))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let badge = header.and_then(|header| first_text(header, &self.selectors.success_badge));
        let default_label =
            header.and_then(|header| first_text(header, &self.selectors.default_label));

        let (text, image_link, image_name) =
            match root.select(&self.selectors.image_link).next() {
                Some(link) => {
                    let image_name = link
                        .select(&self.selectors.image)
                        .next()
                        .and_then(|image| image.value().attr("alt"))
                        .map(str::to_string);
                    let image_link = link.value().attr("href").map(str::to_string);
                    (None, image_link, image_name)
                }
                None => {
                    let text = if author_id == 0 {
                        first_text(root, &self.selectors.alert)
                            .map(|text| text.trim().to_string())
                            .ok_or(ParseError::MissingElement("div[role=alert]"))?
                    } else {
                        first_text(root, &self.selectors.message_text)
                            .map(|text| text.trim().to_string())
                            .ok_or(ParseError::MissingElement("div.chat-msg-text"))?
                    };
                    (Some(text), None, None)
                }
            };

        let user_links = root
            .select(&self.selectors.user_links)
            .filter_map(|link| {
                let id = user_id_from_href(link.value().attr("href")?)?;
                Some((id, element_text(link).trim().to_string()))
            })
            .collect();

        Ok(RawMessage {
            id,
            chat_id,
            author_id,
            author_name,
            badge,
            default_label,
            text,
            image_link,
            image_name,
            html: html.to_string(),
            user_links,
        })
    }

    fn parse_order(
        &self,
        item: ElementRef<'_>,
        account_id: i64,
        now: NaiveDateTime,
    ) -> Result<OrderSummary, ParseError> {
        let status = if has_class(item, "warning") {
            OrderStatus::Refunded
        } else if has_class(item, "info") {
            OrderStatus::Paid
        } else {
            OrderStatus::Closed
        };
        let id = first_text(item, &self.selectors.order_id)
            .ok_or(ParseError::MissingElement("div.tc-order"))?;
        let id = id.trim().trim_start_matches('#').to_string();
        let description = first_text(item, &self.selectors.order_desc)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        let price_text = first_text(item, &self.selectors.order_price)
            .ok_or(ParseError::MissingElement("div.tc-price"))?;
        let (amount, symbol) = price_text
            .trim()
            .rsplit_once(char::is_whitespace)
            .ok_or_else(|| ParseError::InvalidData(format!("price: {price_text:?}")))?;
        let price = amount
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidData(format!("price: {price_text:?}")))?;

        let buyer = item
            .select(&self.selectors.order_buyer)
            .next()
            .ok_or(ParseError::MissingElement("div.media-user-name span"))?;
        let buyer_href = buyer.value().attr("data-href").unwrap_or_default();
        let buyer_id = user_id_from_href(buyer_href).ok_or_else(|| ParseError::InvalidAttribute {
            name: "data-href",
            value: buyer_href.to_string(),
        })?;
        let created_at_text = first_text(item, &self.selectors.order_date)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        Ok(OrderSummary {
            id,
            description,
            status,
            price,
            currency: Currency::from_symbol(symbol),
            buyer_username: element_text(buyer).trim().to_string(),
            buyer_id,
            chat_id: OrderSummary::private_chat_id(buyer_id, account_id),
            created_at: parse_order_date(&created_at_text, now),
            created_at_text,
            subcategory_name: first_text(item, &self.selectors.order_subcategory)
                .map(|text| text.trim().to_string())
                .unwrap_or_default(),
            html: item.html(),
        })
    }
}

impl RecordParser for HtmlRecordParser {
    fn parse_chat_bookmarks(
        &self,
        data: &Value,
    ) -> Result<Vec<FragmentParse<ChatSummary>>, ParseError> {
        let html = data
            .get("html")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingElement("chat_bookmarks.html"))?;
        let fragment = Html::parse_fragment(html);
        Ok(fragment
            .root_element()
            .select(&self.selectors.contact_item)
            .map(|item| self.parse_contact(item))
            .collect())
    }

    fn parse_chat_history(&self, chat_id: i64, data: &Value) -> Result<ChatHistory, ParseError> {
        let entries = data
            .get("messages")
            .and_then(Value::as_array)
            .ok_or(ParseError::MissingElement("chat_node.messages"))?;
        let node_name = data
            .pointer("/node/name")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut history = ChatHistory {
            chat_id,
            node_name,
            ..ChatHistory::default()
        };
        for entry in entries {
            match self.parse_message(chat_id, entry) {
                Ok(message) => history.messages.push(message),
                Err(error) => history.failures.push(error),
            }
        }
        history.messages.sort_by_key(|message| message.id);
        Ok(history)
    }

    fn parse_buyer_viewing(
        &self,
        buyer_id: i64,
        tag: Option<&str>,
        data: Option<&Value>,
    ) -> Result<BuyerViewing, ParseError> {
        let Some(data) = data else {
            return Ok(BuyerViewing::nothing(buyer_id));
        };
        let desktop = data
            .get("html")
            .filter(|html| !matches!(html, Value::Null | Value::Bool(false)))
            .and_then(|html| html.get("desktop"))
            .and_then(Value::as_str)
            .filter(|html| !html.trim().is_empty());
        let mut viewing = BuyerViewing {
            tag: tag.map(str::to_string),
            ..BuyerViewing::nothing(buyer_id)
        };
        if let Some(desktop) = desktop {
            let fragment = Html::parse_fragment(desktop);
            let anchor = fragment
                .root_element()
                .select(&self.selectors.anchor)
                .next()
                .ok_or(ParseError::MissingElement("c-p-u anchor"))?;
            viewing.link = anchor.value().attr("href").map(str::to_string);
            viewing.text = Some(element_text(anchor).trim().to_string());
            viewing.html = Some(desktop.to_string());
        }
        Ok(viewing)
    }

    fn parse_order_list(
        &self,
        html: &str,
        account_id: i64,
    ) -> Result<Vec<FragmentParse<OrderSummary>>, ParseError> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        if root.select(&self.selectors.login_form).next().is_some() {
            return Err(ParseError::LoginPage);
        }
        let now = Local::now().naive_local();
        Ok(root
            .select(&self.selectors.order_item)
            .map(|item| match self.parse_order(item, account_id, now) {
                Ok(order) => FragmentParse::Parsed(order),
                Err(error) => FragmentParse::Failed(error),
            })
            .collect())
    }

    fn classify(&self, text: &str) -> MessageKind {
        self.classifier.classify(text)
    }
}
