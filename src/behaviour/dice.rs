//! `!roll <N>d<S>[+/-K]`: rolls dice and reports the result in channel.

use std::sync::{Arc, LazyLock};

use anyhow::anyhow;
use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use tracing::info;

use super::reply::Reply;
use crate::{
    base::{event::MessageCreated, types::Void},
    interaction::dispatcher::Listener,
    service::ports::Responder,
};

const COMMAND: &str = "!roll";
const MAX_DICE: u32 = 30;
const MAX_SIDES: u32 = 100;
const MAX_OFFSET: i64 = 10_000;

const EMOJI_ANNOYED: &str = "😒";
const EMOJI_SAD: &str = "😢";

static ROLL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*d\s*(\d+)\s*([+-]\d+)?").expect("roll pattern is valid"));

/// A parsed roll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roll {
    pub dice: u32,
    pub sides: u32,
    pub offset: i64,
}

/// Parse a digit run, saturating anything too long for `u32`.
///
/// The roll pattern only admits digits, so a parse failure means overflow.
fn parse_count(digits: &str) -> u32 {
    digits.parse().unwrap_or(u32::MAX)
}

/// Roll `dice` dice with `sides` sides each.
pub fn roll_dice(rng: &mut impl Rng, dice: u32, sides: u32) -> Vec<u32> {
    (0..dice).map(|_| rng.random_range(1..=sides)).collect()
}

/// Render the reply for a completed roll.
pub fn describe_roll(author_id: &str, rolls: &[u32], offset: i64) -> String {
    let mut text = format!("<@{}> rolled ", author_id);

    let count = rolls.len();
    for (index, roll) in rolls.iter().enumerate() {
        if index > 0 && index < count - 1 {
            text.push_str(", ");
        } else if index > 0 {
            text.push_str(" and ");
        }
        text.push_str(&roll.to_string());
    }

    let mut total: i64 = rolls.iter().map(|&roll| i64::from(roll)).sum();
    if count > 1 {
        text.push_str(&format!(" for a total of {}", total));
    }

    if offset != 0 {
        total = total.saturating_add(offset);
        text.push_str(&format!(", with {:+} the total becomes {}", offset, total));
    }

    text
}

/// Dice rolling behaviour.
pub struct DiceRoller {
    responder: Arc<dyn Responder>,
}

impl DiceRoller {
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self { responder }
    }
}

#[async_trait]
impl Listener for DiceRoller {
    async fn handle_message(&self, message: &MessageCreated) -> Void {
        let Some((command, request)) = message.content.trim_matches(' ').split_once(' ') else {
            return Ok(());
        };
        if command != COMMAND {
            return Ok(());
        }

        let reply = Reply::new(&*self.responder, message);

        let Some(groups) = ROLL.captures(request) else {
            return reply.respond_error(anyhow!("no roll in `{}`", request), EMOJI_ANNOYED, "malformed command").await;
        };

        let dice = parse_count(&groups[1]);
        let sides = parse_count(&groups[2]);

        if dice > MAX_DICE {
            return reply.respond(Some(EMOJI_SAD), &format!("but I only have {} dice... 😰", MAX_DICE)).await;
        }
        if dice < 1 {
            return reply.react(EMOJI_ANNOYED).await;
        }

        if sides > MAX_SIDES {
            return reply.respond(Some(EMOJI_SAD), &format!("but I only have dice with up to {} sides... 😰", MAX_SIDES)).await;
        }
        if sides < 1 {
            return reply.react(EMOJI_ANNOYED).await;
        }

        let offset = match groups.get(3) {
            Some(offset) => match offset.as_str().parse::<i64>() {
                Ok(offset) if (-MAX_OFFSET..=MAX_OFFSET).contains(&offset) => offset,
                _ => return reply.respond(Some(EMOJI_SAD), &format!("but I can only count up to ±{}... 😰", MAX_OFFSET)).await,
            },
            None => 0,
        };

        let roll = Roll { dice, sides, offset };
        info!("Rolling dice: {:?}", roll);

        let rolls = roll_dice(&mut rand::rng(), roll.dice, roll.sides);

        reply.respond(None, &describe_roll(&message.author.id, &rolls, roll.offset)).await
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        base::entity::{ChannelInfo, UserInfo},
        service::mocks::MockResponder,
    };

    #[derive(Default)]
    struct Sent {
        messages: Vec<String>,
        reactions: Vec<String>,
    }

    fn recording_responder() -> (MockResponder, Arc<Mutex<Sent>>) {
        let sent = Arc::new(Mutex::new(Sent::default()));

        let mut responder = MockResponder::new();
        let messages = sent.clone();
        responder.expect_send_message().returning(move |_, text| {
            messages.lock().unwrap().messages.push(text.to_string());
            Ok(())
        });
        let reactions = sent.clone();
        responder.expect_add_reaction().returning(move |_, _, emoji| {
            reactions.lock().unwrap().reactions.push(emoji.to_string());
            Ok(())
        });

        (responder, sent)
    }

    fn message(content: &str) -> MessageCreated {
        MessageCreated {
            channel: ChannelInfo::new("C", "general"),
            author: UserInfo::stub("42"),
            id: "M".to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    async fn roll(content: &str) -> Sent {
        let (responder, sent) = recording_responder();
        DiceRoller::new(Arc::new(responder)).handle_message(&message(content)).await.unwrap();

        std::mem::take(&mut *sent.lock().unwrap())
    }

    #[test]
    fn test_rolls_stay_within_sides() {
        let mut rng = StdRng::seed_from_u64(7);

        for sides in [1, 2, 6, 100] {
            let rolls = roll_dice(&mut rng, 30, sides);
            assert_eq!(rolls.len(), 30);
            assert!(rolls.iter().all(|&roll| (1..=sides).contains(&roll)));
        }
    }

    #[test]
    fn test_single_die_has_no_total() {
        assert_eq!(describe_roll("42", &[4], 0), "<@42> rolled 4");
    }

    #[test]
    fn test_describe_roll_lists_total_and_offset() {
        assert_eq!(describe_roll("42", &[1, 2, 3], 0), "<@42> rolled 1, 2 and 3 for a total of 6");
        assert_eq!(describe_roll("42", &[5, 6], 2), "<@42> rolled 5 and 6 for a total of 11, with +2 the total becomes 13");
        assert_eq!(describe_roll("42", &[3], -1), "<@42> rolled 3, with -1 the total becomes 2");
    }

    #[test]
    fn test_describe_roll_saturates_extreme_offset() {
        assert_eq!(describe_roll("42", &[3], i64::MAX), format!("<@42> rolled 3, with +{} the total becomes {}", i64::MAX, i64::MAX));
        assert_eq!(describe_roll("42", &[3], i64::MIN).split(' ').next_back(), Some((i64::MIN + 3).to_string().as_str()));
    }

    #[tokio::test]
    async fn test_valid_roll_replies_in_channel() {
        let sent = roll("!roll 3d6+2").await;

        assert_eq!(sent.messages.len(), 1);
        assert!(sent.messages[0].starts_with("<@42> rolled "));
        assert!(sent.messages[0].contains("for a total of"));
        assert!(sent.messages[0].contains(", with +2 the total becomes"));
        assert!(sent.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_spaces_are_tolerated() {
        let sent = roll("  !roll 2 d 4 -1 ").await;

        assert_eq!(sent.messages.len(), 1);
        assert!(sent.messages[0].contains(", with -1 the total becomes"));
    }

    #[tokio::test]
    async fn test_malformed_roll_is_refused() {
        let sent = roll("!roll lots").await;

        assert_eq!(sent.messages, vec!["malformed command".to_string()]);
        assert_eq!(sent.reactions, vec![EMOJI_ANNOYED.to_string()]);
    }

    #[tokio::test]
    async fn test_limits_are_enforced() {
        let sent = roll("!roll 31d6").await;
        assert_eq!(sent.messages, vec!["but I only have 30 dice... 😰".to_string()]);
        assert_eq!(sent.reactions, vec![EMOJI_SAD.to_string()]);

        let sent = roll("!roll 2d101").await;
        assert_eq!(sent.messages, vec!["but I only have dice with up to 100 sides... 😰".to_string()]);
        assert_eq!(sent.reactions, vec![EMOJI_SAD.to_string()]);

        let sent = roll("!roll 2d6+10000").await;
        assert_eq!(sent.messages.len(), 1);
        assert!(sent.messages[0].contains(", with +10000 the total becomes"));

        for zero in ["!roll 0d6", "!roll 2d0"] {
            let sent = roll(zero).await;
            assert!(sent.messages.is_empty());
            assert_eq!(sent.reactions, vec![EMOJI_ANNOYED.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_oversized_numbers_are_refused() {
        let sent = roll("!roll 99999999999d6").await;
        assert_eq!(sent.messages, vec!["but I only have 30 dice... 😰".to_string()]);
        assert_eq!(sent.reactions, vec![EMOJI_SAD.to_string()]);

        let sent = roll("!roll 5d99999999999").await;
        assert_eq!(sent.messages, vec!["but I only have dice with up to 100 sides... 😰".to_string()]);
        assert_eq!(sent.reactions, vec![EMOJI_SAD.to_string()]);

        for offset in ["+10001", "-10001", "+9223372036854775807", "-99999999999999999999"] {
            let sent = roll(&format!("!roll 1d6{}", offset)).await;
            assert_eq!(sent.messages, vec!["but I can only count up to ±10000... 😰".to_string()]);
            assert_eq!(sent.reactions, vec![EMOJI_SAD.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_other_messages_are_ignored() {
        // No expectations: any response panics the mock.
        let roller = DiceRoller::new(Arc::new(MockResponder::new()));

        for content in ["hello", "!roll", "!rolls 2d6", "!ping"] {
            roller.handle_message(&message(content)).await.unwrap();
        }
    }
}
