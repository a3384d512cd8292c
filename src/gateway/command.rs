use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Track(String),
    Unknown,
}

impl Command {
    pub fn parse(text: &str, allowed_hosts: &[String]) -> Self {
        let Some(first) = text.split_whitespace().next() else {
            return Command::Unknown;
        };

        if first.starts_with('/') {
            // Group chats address commands as "/list@SomeBot".
            let name = first.split('@').next().unwrap_or(first).to_lowercase();
            return match name.as_str() {
                "/start" | "/help" => Command::Help,
                "/list" => Command::List,
                _ => Command::Unknown,
            };
        }

        if is_product_link(first, allowed_hosts) {
            return Command::Track(first.to_string());
        }

        Command::Unknown
    }
}

/// True for http(s) URLs on one of `allowed_hosts` or a subdomain of one.
pub fn is_product_link(text: &str, allowed_hosts: &[String]) -> bool {
    let Ok(url) = Url::parse(text) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();

    allowed_hosts.iter().any(|allowed| {
        let allowed = allowed.trim().to_lowercase();
        !allowed.is_empty()
            && (host == allowed || host.ends_with(&format!(".{allowed}")))
    })
}
