//! User-facing message text, formatted for Telegram's legacy Markdown.

use crate::models::{PriceDrop, TrackedItem};

const CURRENCY: &str = "₹";
const LIST_TITLE_CHARS: usize = 40;

pub fn format_price(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{CURRENCY}{grouped}")
}

pub fn help() -> String {
    [
        "🤖 *Price Tracker Bot*",
        "",
        "📌 *How to use:*",
        "• Send a product link",
        "• I'll record its current price",
        "• You get an alert when the price drops",
        "",
        "📋 *Commands:*",
        "• /list - View tracked products",
        "• /help - Show this help",
        "",
        "💡 *Tip:* Copy the full product URL from your browser",
    ]
    .join("\n")
}

pub fn usage_hint(allowed_hosts: &[String]) -> String {
    let host = allowed_hosts
        .first()
        .map(String::as_str)
        .unwrap_or("the store");
    format!(
        "📌 Please send a valid product link.\n\nExample: `https://www.{host}/product-name/p/itm123456789`"
    )
}

pub fn fetching() -> String {
    "🔍 Fetching product details... Please wait...".to_string()
}

pub fn added(item: &TrackedItem) -> String {
    format!(
        "✅ *Product Added Successfully!*\n\n📱 *Product:* {}\n💰 *Current Price:* {}\n\n🔔 You'll get alerts when the price drops!",
        item.title,
        format_price(item.last_price)
    )
}

pub fn already_tracked(current_price: u64) -> String {
    format!(
        "⚠️ Already tracking this product!\n\n💰 *Current Price:* {}",
        format_price(current_price)
    )
}

pub fn extraction_failed() -> String {
    [
        "❌ Could not fetch the price. Possible reasons:",
        "",
        "🔒 The site's anti-bot protection blocked the request",
        "🌐 Short links sometimes fail, try the full product URL",
        "📱 The product might be unavailable",
        "",
        "Please try again in a few minutes.",
    ]
    .join("\n")
}

pub fn invalid_product() -> String {
    "❌ That doesn't look like a product link.".to_string()
}

pub fn store_failed() -> String {
    "❌ Error processing product. Please try again.".to_string()
}

pub fn empty_list() -> String {
    "📋 No products tracked yet.\n\nSend me a product link to start tracking!".to_string()
}

pub fn product_list(items: &[TrackedItem], limit: usize) -> String {
    if items.is_empty() {
        return empty_list();
    }

    let mut message = format!("📋 *Your Tracked Products ({}):*\n\n", items.len());

    for (i, item) in items.iter().take(limit).enumerate() {
        message.push_str(&format!(
            "{}. *{}*\n   {} {}\n\n",
            i + 1,
            truncate_title(&item.title),
            format_price(item.last_price),
            trend(item.initial_price, item.last_price)
        ));
    }

    if items.len() > limit {
        message.push_str(&format!("... and {} more", items.len() - limit));
    }

    message.trim_end().to_string()
}

pub fn price_drop_alert(item: &TrackedItem, drop: &PriceDrop) -> String {
    format!(
        "🎉 *PRICE DROP ALERT!*\n\n📱 *{}*\n💰 *New Price:* {}\n📉 *Was:* {}\n💸 *You Save:* {} ({:.1}% off)\n\n🔗 {}",
        item.title,
        format_price(drop.new_price),
        format_price(drop.old_price),
        format_price(drop.discount),
        drop.discount_percent,
        item.product_url
    )
}

fn trend(initial: u64, current: u64) -> String {
    if initial == 0 || current == initial {
        return "➖ Same".to_string();
    }
    let change = (current as f64 - initial as f64) / initial as f64 * 100.0;
    if current < initial {
        format!("📉 -{:.1}%", change.abs())
    } else {
        format!("📈 +{:.1}%", change)
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= LIST_TITLE_CHARS {
        return title.to_string();
    }
    let cut: String = title.chars().take(LIST_TITLE_CHARS).collect();
    format!("{}...", cut.trim_end())
}
