pub const SCHEMA: &str = r#"
-- tracked_items table
CREATE TABLE IF NOT EXISTS tracked_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id TEXT NOT NULL,
    product_link TEXT NOT NULL,
    title TEXT NOT NULL,
    initial_price INTEGER NOT NULL CHECK (initial_price >= 0),
    last_price INTEGER NOT NULL CHECK (last_price >= 0),
    added_date TEXT NOT NULL,
    last_checked TEXT,
    UNIQUE(chat_id, product_link)
);

CREATE INDEX IF NOT EXISTS idx_tracked_items_chat_id ON tracked_items(chat_id);
"#;
