//! Reply builders and plain-text rendering.

use rust_decimal::Decimal;

use super::adjust::Adjustment;
use super::interaction::{
    Button, ButtonStyle, Component, Embed, EmbedField, InteractionKind, Reply, SelectOption,
};
use super::pager::Pager;
use crate::storage::{format_cents, AdjustOutcome, Currency, Operation, Player};
use crate::validation::MAX_AMOUNT_INPUT;

/// Embed color for the player detail view.
pub const GOLD: u32 = 0xF1C40F;

/// Select option labels are capped by the chat platform.
const OPTION_LABEL_MAX: usize = 100;

/// `1234567.891` → `1,234,567.89`
pub fn format_grouped(value: Decimal) -> String {
    let text = format_cents(&value);
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}.{}", sign, grouped, frac)
}

pub fn option_description(player: &Player) -> String {
    format!(
        "{} {} gems | {} {} coins",
        Currency::Gems.emoji(),
        format_cents(&player.gems),
        Currency::Coins.emoji(),
        format_cents(&player.coins)
    )
}

fn option_label(name: &str) -> String {
    if name.chars().count() <= OPTION_LABEL_MAX {
        name.to_string()
    } else {
        name.chars().take(OPTION_LABEL_MAX).collect()
    }
}

/// List view for the roster or an active search.
pub fn player_list(list: &Pager<Player>, query: Option<&str>) -> Reply {
    let page = list.current();
    let content = match query {
        Some(q) => format!(
            "**Search results for '{}'** ({} matches)\nSelect a player to manage:",
            q,
            list.len()
        ),
        None => format!(
            "**Economy Manager** ({} players)\nSelect a player to manage:",
            list.len()
        ),
    };

    let options = page
        .items
        .iter()
        .map(|p| SelectOption {
            label: option_label(&p.name),
            description: option_description(p),
            value: p.id.clone(),
        })
        .collect();

    let mut prev = Button::new("Previous", ButtonStyle::Secondary, InteractionKind::PrevPage)
        .with_emoji("◀️");
    prev.disabled = !page.has_prev;
    let mut next =
        Button::new("Next", ButtonStyle::Secondary, InteractionKind::NextPage).with_emoji("▶️");
    next.disabled = !page.has_next;

    let mut components = vec![
        Component::Select {
            placeholder: "Choose a player...".to_string(),
            options,
        },
        Component::Button(prev),
        Component::Button(Button::indicator(page.indicator())),
        Component::Button(next),
        Component::TextInput {
            label: "Search".to_string(),
            placeholder: "Player name...".to_string(),
            max_length: 100,
        },
    ];
    if query.is_some() {
        components.push(Component::Button(
            Button::new("Clear search", ButtonStyle::Secondary, InteractionKind::ClearSearch)
                .with_emoji("✖️"),
        ));
    }
    Reply::text(content).with_components(components)
}

pub fn player_embed(player: &Player) -> Embed {
    Embed {
        title: "💰 Economy Manager".to_string(),
        description: format!("**Player:** {}\n**UUID:** `{}`", player.name, player.id),
        fields: Currency::ALL
            .iter()
            .map(|c| EmbedField {
                name: format!("{} {}", c.emoji(), c.title()),
                value: format!("`{}`", format_grouped(player.balance(*c))),
                inline: true,
            })
            .collect(),
        footer: Some("Use the buttons below to manage this player's economy".to_string()),
        color: GOLD,
    }
}

/// Detail view with the four mutation affordances.
pub fn player_detail(player: &Player) -> Reply {
    let mut components = Vec::new();
    for currency in Currency::ALL {
        for operation in [Operation::Add, Operation::Remove] {
            let style = match operation {
                Operation::Add => ButtonStyle::Success,
                Operation::Remove => ButtonStyle::Danger,
            };
            components.push(Component::Button(
                Button::new(
                    format!("{} {}", operation.title(), currency.title()),
                    style,
                    InteractionKind::Begin(currency, operation),
                )
                .with_emoji(currency.emoji()),
            ));
        }
    }
    components.push(Component::Button(
        Button::new("Refresh", ButtonStyle::Secondary, InteractionKind::Refresh).with_emoji("🔄"),
    ));
    components.push(Component::Button(Button::new(
        "Back",
        ButtonStyle::Secondary,
        InteractionKind::Back,
    )));
    Reply::text(String::new())
        .with_embed(player_embed(player))
        .with_components(components)
}

pub fn amount_prompt(adj: &Adjustment) -> Reply {
    Reply::text(format!(
        "**{} {}** {} **{}**\nEnter an amount (decimals allowed):",
        adj.operation.title(),
        adj.currency.title(),
        adj.operation.preposition(),
        adj.player_name
    ))
    .with_components(vec![
        Component::TextInput {
            label: "Amount".to_string(),
            placeholder: "Enter amount...".to_string(),
            max_length: MAX_AMOUNT_INPUT,
        },
        Component::Button(Button::new("Cancel", ButtonStyle::Secondary, InteractionKind::Cancel)),
    ])
}

pub fn confirmation(adj: &Adjustment, amount: Decimal) -> Reply {
    Reply::text(format!(
        "**Confirmation Required**\n{} **{}** {} {} {} **{}**?",
        adj.operation.title(),
        format_cents(&amount),
        adj.currency.emoji(),
        adj.currency,
        adj.operation.preposition(),
        adj.player_name
    ))
    .with_components(vec![
        Component::Button(
            Button::new("Confirm", ButtonStyle::Success, InteractionKind::Confirm).with_emoji("✅"),
        ),
        Component::Button(
            Button::new("Cancel", ButtonStyle::Danger, InteractionKind::Cancel).with_emoji("❌"),
        ),
    ])
}

/// Result of a confirmed adjustment. The confirmation affordances are gone.
pub fn outcome(outcome: &AdjustOutcome) -> Reply {
    if outcome.ok() {
        Reply::text(format!("✅ {}", outcome.message()))
    } else {
        Reply::error(outcome.message())
    }
}

pub fn cancelled() -> Reply {
    Reply::text("❌ Transaction cancelled.")
}

/// Plain-text rendering for the terminal transport.
pub fn to_text(reply: &Reply) -> String {
    let mut out = String::new();
    if !reply.content.is_empty() {
        out.push_str(&reply.content);
        out.push('\n');
    }
    if let Some(embed) = &reply.embed {
        out.push_str(&format!("== {} ==\n", embed.title));
        if !embed.description.is_empty() {
            out.push_str(&embed.description);
            out.push('\n');
        }
        for field in &embed.fields {
            out.push_str(&format!("  {}: {}\n", field.name, field.value));
        }
        if let Some(footer) = &embed.footer {
            out.push_str(&format!("({})\n", footer));
        }
    }
    let mut buttons = Vec::new();
    for component in &reply.components {
        match component {
            Component::Select { options, .. } => {
                for (i, opt) in options.iter().enumerate() {
                    out.push_str(&format!("  {:>2}. {}  [{}]\n", i + 1, opt.label, opt.description));
                }
            }
            Component::Button(b) => {
                let label = match b.emoji {
                    Some(e) => format!("{} {}", e, b.label),
                    None => b.label.clone(),
                };
                if b.disabled {
                    buttons.push(format!("({})", label));
                } else {
                    buttons.push(format!("[{}]", label));
                }
            }
            Component::TextInput { label, max_length, .. } => {
                out.push_str(&format!("  > {} (max {} chars)\n", label, max_length));
            }
        }
    }
    if !buttons.is_empty() {
        out.push_str(&buttons.join(" "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn grouped_formatting() {
        assert_eq!(format_grouped(dec("0")), "0.00");
        assert_eq!(format_grouped(dec("999.5")), "999.50");
        assert_eq!(format_grouped(dec("1000")), "1,000.00");
        assert_eq!(format_grouped(dec("1234567.891")), "1,234,567.89");
        assert_eq!(format_grouped(dec("-12345.005")), "-12,345.01");
    }

    #[test]
    fn option_description_shows_both_balances() {
        let p = Player::new("id", "Alice", dec("100"), dec("250.5"));
        assert_eq!(option_description(&p), "💎 100.00 gems | 🪙 250.50 coins");
    }

    #[test]
    fn detail_embed_layout() {
        let p = Player::new("u-1", "Alice", dec("1234.5"), dec("0"));
        let reply = player_detail(&p);
        let embed = reply.embed.as_ref().unwrap();
        assert_eq!(embed.description, "**Player:** Alice\n**UUID:** `u-1`");
        assert_eq!(embed.fields[0].value, "`1,234.50`");
        assert_eq!(embed.color, GOLD);
        assert!(reply.has_action(&InteractionKind::Begin(Currency::Coins, Operation::Remove)));
        assert!(reply.ephemeral);
    }

    #[test]
    fn confirmation_wording() {
        let p = Player::new("u-1", "Alice", dec("100"), dec("0"));
        let adj = Adjustment::new(&p, Currency::Gems, Operation::Add);
        let reply = confirmation(&adj, dec("25.5"));
        assert_eq!(
            reply.content,
            "**Confirmation Required**\nAdd **25.50** 💎 gems to **Alice**?"
        );
        assert!(reply.has_action(&InteractionKind::Confirm));

        let adj = Adjustment::new(&p, Currency::Coins, Operation::Remove);
        assert!(confirmation(&adj, dec("3")).content.ends_with("Remove **3.00** 🪙 coins from **Alice**?"));
    }

    #[test]
    fn list_affordances_follow_page() {
        let players: Vec<Player> = (0..30)
            .map(|i| Player::new(format!("id{}", i), format!("P{:02}", i), Decimal::ZERO, Decimal::ZERO))
            .collect();
        let pager = Pager::new(players);
        let reply = player_list(&pager, None);
        assert_eq!(reply.select_options().len(), 25);
        assert!(!reply.has_action(&InteractionKind::PrevPage));
        assert!(reply.has_action(&InteractionKind::NextPage));
        assert!(to_text(&reply).contains("(Page 1/2)"));
    }
}
