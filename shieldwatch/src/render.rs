/// Notification rendering
///
/// Turns one attack detail into the webhook message document. Rendering is a
/// pure function: the same detail and content always give the same message.
use crate::message::{AttackDetail, Bucket};
use serde::Serialize;

pub const COLOR_ENDED: u32 = 0x008000; // Green
pub const COLOR_ACTIVE: u32 = 0xFF0000; // Red

const TITLE_ENDED: &str = "✅ | Attack ended";
const TITLE_ACTIVE: &str = "⚠️ | Attack detected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
}

/// The document posted to every webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

impl WebhookMessage {
    pub fn embed(&self) -> Option<&Embed> {
        self.embeds.first()
    }
}

/// Renders an attack detail, prefixed by `content` unless it is blank.
pub fn render(detail: &AttackDetail, content: Option<&str>) -> WebhookMessage {
    WebhookMessage {
        content: content
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string),
        embeds: vec![render_embed(detail)],
    }
}

fn render_embed(detail: &AttackDetail) -> Embed {
    let attack = &detail.attack;
    let info = &detail.info;

    let (title, color) = if detail.has_ended() {
        (TITLE_ENDED, COLOR_ENDED)
    } else {
        (TITLE_ACTIVE, COLOR_ACTIVE)
    };

    let mut fields = vec![
        field("🌐 | Target", attack.target.clone()),
        field("🔗 | Type", attack.description.clone()),
        field(
            "📶 | Magnitude",
            format!("{} Mbps | {} Pps", attack.mbps, attack.pps),
        ),
        field(
            "🕒 | Started",
            attack.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
    ];

    if detail.has_ended() {
        fields.push(field(
            "🕒 | Duration",
            format!("{} seconds", attack.total_duration.unwrap_or_default()),
        ));
        fields.push(field(
            "📶 | Total volume",
            format!("{} Mb", attack.total_volume.unwrap_or_default()),
        ));
    }

    fields.extend([
        field("📡 | Destination ports", join_buckets(&info.destination_ports, str::to_string)),
        field("📡 | Source ports", join_buckets(&info.source_ports, str::to_string)),
        field("🔗 | Protocols", join_buckets(&info.protocols, protocol_name)),
        EmbedField {
            inline: true,
            ..field("🔗 | Packet sizes", join_buckets(&info.packets, str::to_string))
        },
        field("📡 | Source IPs", join_buckets(&info.source_ips, str::to_string)),
        field("📡 | Source ASNs", join_buckets(&info.source_asns, str::to_string)),
        field("🌐 | Countries", join_buckets(&info.source_countries, str::to_string)),
    ]);

    Embed {
        title: title.to_string(),
        color,
        fields,
        footer: EmbedFooter {
            text: format!("ID: {}", attack.id),
        },
    }
}

fn field(name: &str, value: String) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline: false,
    }
}

// Bucket names one per line, without the provider's catch-all `other` bucket.
fn join_buckets(buckets: &[Bucket], label: fn(&str) -> String) -> String {
    buckets
        .iter()
        .filter(|b| !b.is_other())
        .map(|b| label(&b.name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Names an IP protocol number; anything unrecognised is shown as given.
fn protocol_name(number: &str) -> String {
    let name = match number.trim().parse::<u8>() {
        Ok(1) => "ICMP",
        Ok(2) => "IGMP",
        Ok(4) => "IPv4",
        Ok(6) => "TCP",
        Ok(17) => "UDP",
        Ok(41) => "IPv6",
        Ok(47) => "GRE",
        Ok(50) => "ESP",
        Ok(51) => "AH",
        Ok(58) => "ICMPv6",
        Ok(89) => "OSPF",
        Ok(132) => "SCTP",
        _ => return number.to_string(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::detail;
    use pretty_assertions::assert_eq;

    fn field_names(message: &WebhookMessage) -> Vec<String> {
        message.embeds[0]
            .fields
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    fn field_value<'a>(message: &'a WebhookMessage, name: &str) -> &'a str {
        &message.embeds[0]
            .fields
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("missing field {}", name))
            .value
    }

    #[test]
    fn test_render_active_attack() {
        let message = render(&detail(3, false), None);
        let embed = message.embed().unwrap();

        assert_eq!(message.content, None);
        assert_eq!(embed.title, TITLE_ACTIVE);
        assert_eq!(embed.color, COLOR_ACTIVE);
        assert_eq!(embed.footer.text, "ID: 3");
        assert_eq!(
            field_names(&message),
            vec![
                "🌐 | Target",
                "🔗 | Type",
                "📶 | Magnitude",
                "🕒 | Started",
                "📡 | Destination ports",
                "📡 | Source ports",
                "🔗 | Protocols",
                "🔗 | Packet sizes",
                "📡 | Source IPs",
                "📡 | Source ASNs",
                "🌐 | Countries",
            ]
        );
        assert_eq!(field_value(&message, "📶 | Magnitude"), "300 Mbps | 3000 Pps");
        assert_eq!(field_value(&message, "🕒 | Started"), "2024-05-01 10:00:00 UTC");
    }

    #[test]
    fn test_render_ended_attack_adds_totals() {
        let message = render(&detail(3, true), None);
        let embed = message.embed().unwrap();

        assert_eq!(embed.title, TITLE_ENDED);
        assert_eq!(embed.color, COLOR_ENDED);
        assert_eq!(embed.fields[4].name, "🕒 | Duration");
        assert_eq!(embed.fields[4].value, "300 seconds");
        assert_eq!(embed.fields[5].name, "📶 | Total volume");
        assert_eq!(embed.fields[5].value, "5120 Mb");
        assert_eq!(embed.fields.len(), 13);
    }

    #[test]
    fn test_other_bucket_is_dropped() {
        let message = render(&detail(1, false), None);

        assert_eq!(field_value(&message, "📡 | Destination ports"), "80");
        assert_eq!(field_value(&message, "📡 | Source ports"), "53\n123");
        assert_eq!(field_value(&message, "📡 | Source IPs"), "198.51.100.1");
        assert!(
            message.embeds[0]
                .fields
                .iter()
                .all(|f| !f.value.split('\n').any(|line| line == "other"))
        );
    }

    #[test]
    fn test_empty_list_keeps_field() {
        let message = render(&detail(1, false), None);

        assert_eq!(field_value(&message, "🌐 | Countries"), "");
    }

    #[test]
    fn test_protocol_numbers_are_named() {
        let message = render(&detail(1, false), None);

        assert_eq!(field_value(&message, "🔗 | Protocols"), "UDP\nTCP");
        assert_eq!(protocol_name("250"), "250");
        assert_eq!(protocol_name("gre"), "gre");
    }

    #[test]
    fn test_blank_content_is_omitted() {
        assert_eq!(render(&detail(1, false), Some("  ")).content, None);
        assert_eq!(
            render(&detail(1, false), Some("@here")).content.as_deref(),
            Some("@here")
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let attack = detail(4, true);

        let first = serde_json::to_string(&render(&attack, Some("@here"))).unwrap();
        let second = serde_json::to_string(&render(&attack, Some("@here"))).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(render(&detail(2, false), None)).unwrap();

        assert!(value.get("content").is_none());
        assert_eq!(value["embeds"][0]["footer"]["text"], "ID: 2");
        assert_eq!(value["embeds"][0]["fields"][0]["inline"], false);
        assert_eq!(value["embeds"][0]["color"], COLOR_ACTIVE);
    }
}
