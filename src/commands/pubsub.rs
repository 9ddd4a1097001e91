//! Subscription commands (SUBSCRIBE, UNSUBSCRIBE, PSUBSCRIBE, PUNSUBSCRIBE)
//!
//! Subscriptions are connection-local bookkeeping: they never touch the
//! keyspace and never take the global lock. Each channel or pattern gets its
//! own confirmation reply.

use super::{Command, ExecutionContext, Op};
use crate::error::CommandError;
use crate::protocol::RespValue;
use bytes::Bytes;

/// SUBSCRIBE command - Listen for messages published to channels
///
/// Syntax: SUBSCRIBE channel [channel ...]
pub struct SubscribeCommand;

impl Command for SubscribeCommand {
    fn name(&self) -> &'static str {
        "SUBSCRIBE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Subscribe(args.to_vec()))
    }
}

/// UNSUBSCRIBE command - Stop listening on channels (all of them if none given)
///
/// Syntax: UNSUBSCRIBE [channel ...]
pub struct UnsubscribeCommand;

impl Command for UnsubscribeCommand {
    fn name(&self) -> &'static str {
        "UNSUBSCRIBE"
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Unsubscribe(args.to_vec()))
    }
}

/// PSUBSCRIBE command - Listen for messages on channels matching patterns
///
/// Syntax: PSUBSCRIBE pattern [pattern ...]
pub struct PSubscribeCommand;

impl Command for PSubscribeCommand {
    fn name(&self) -> &'static str {
        "PSUBSCRIBE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::PSubscribe(args.to_vec()))
    }
}

/// PUNSUBSCRIBE command - Stop listening on patterns (all of them if none given)
///
/// Syntax: PUNSUBSCRIBE [pattern ...]
pub struct PUnsubscribeCommand;

impl Command for PUnsubscribeCommand {
    fn name(&self) -> &'static str {
        "PUNSUBSCRIBE"
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::PUnsubscribe(args.to_vec()))
    }
}

/// Apply a subscription op, one confirmation per channel or pattern
pub(crate) fn apply(ctx: &mut ExecutionContext, op: &Op) -> Vec<RespValue> {
    match op {
        Op::Subscribe(channels) => channels
            .iter()
            .map(|channel| {
                ctx.subscriber_mut().subscribe(channel.clone());
                confirm("subscribe", Some(channel), ctx)
            })
            .collect(),
        Op::PSubscribe(patterns) => patterns
            .iter()
            .map(|pattern| {
                ctx.subscriber_mut().psubscribe(pattern.clone());
                confirm("psubscribe", Some(pattern), ctx)
            })
            .collect(),
        Op::Unsubscribe(channels) => {
            let channels = if channels.is_empty() {
                ctx.subscriber_mut().channels()
            } else {
                channels.clone()
            };
            if channels.is_empty() {
                return vec![confirm("unsubscribe", None, ctx)];
            }
            channels
                .iter()
                .map(|channel| {
                    ctx.subscriber_mut().unsubscribe(channel);
                    confirm("unsubscribe", Some(channel), ctx)
                })
                .collect()
        }
        Op::PUnsubscribe(patterns) => {
            let patterns = if patterns.is_empty() {
                ctx.subscriber_mut().patterns()
            } else {
                patterns.clone()
            };
            if patterns.is_empty() {
                return vec![confirm("punsubscribe", None, ctx)];
            }
            patterns
                .iter()
                .map(|pattern| {
                    ctx.subscriber_mut().punsubscribe(pattern);
                    confirm("punsubscribe", Some(pattern), ctx)
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// [kind, channel, subscription count]
fn confirm(kind: &'static str, target: Option<&Bytes>, ctx: &ExecutionContext) -> RespValue {
    let target = match target {
        Some(target) => RespValue::bulk_string(target.clone()),
        None => RespValue::null(),
    };
    RespValue::array(vec![
        RespValue::bulk_string(Bytes::from_static(kind.as_bytes())),
        target,
        RespValue::integer(ctx.subscription_count() as i64),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::args;

    fn confirmation(kind: &'static str, target: &'static str, count: i64) -> RespValue {
        RespValue::array(vec![
            RespValue::bulk_string(Bytes::from_static(kind.as_bytes())),
            RespValue::bulk_string(Bytes::from_static(target.as_bytes())),
            RespValue::integer(count),
        ])
    }

    #[test]
    fn test_subscribe_counts() {
        let mut ctx = ExecutionContext::new();
        let op = SubscribeCommand.prepare(&args(&["a", "b", "a"])).unwrap();

        let replies = apply(&mut ctx, &op);
        assert_eq!(
            replies,
            vec![
                confirmation("subscribe", "a", 1),
                confirmation("subscribe", "b", 2),
                confirmation("subscribe", "a", 2),
            ]
        );
        assert!(ctx.in_pubsub());
    }

    #[test]
    fn test_unsubscribe_all() {
        let mut ctx = ExecutionContext::new();
        apply(&mut ctx, &Op::Subscribe(args(&["b", "a"])));
        apply(&mut ctx, &Op::PSubscribe(args(&["n*"])));

        let replies = apply(&mut ctx, &Op::Unsubscribe(vec![]));
        assert_eq!(
            replies,
            vec![confirmation("unsubscribe", "a", 2), confirmation("unsubscribe", "b", 1)]
        );
        assert!(ctx.in_pubsub());

        let replies = apply(&mut ctx, &Op::PUnsubscribe(vec![]));
        assert_eq!(replies, vec![confirmation("punsubscribe", "n*", 0)]);
        assert!(!ctx.in_pubsub());
    }

    #[test]
    fn test_unsubscribe_without_subscriptions() {
        let mut ctx = ExecutionContext::new();
        let replies = apply(&mut ctx, &Op::Unsubscribe(vec![]));
        assert_eq!(
            replies,
            vec![RespValue::array(vec![
                RespValue::bulk_string(Bytes::from_static(b"unsubscribe")),
                RespValue::Null,
                RespValue::integer(0),
            ])]
        );
    }
}
