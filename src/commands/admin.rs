//! Connection and server commands (PING, ECHO, SELECT, AUTH, QUIT, DBSIZE, FLUSHDB)

use super::{parse_int, Command, ExecutionContext, Op};
use crate::engine::Engine;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::store::Store;
use bytes::Bytes;
use tracing::{debug, warn};

/// PING command - Test the connection
///
/// Syntax: PING [message]
pub struct PingCommand;

impl Command for PingCommand {
    fn name(&self) -> &'static str {
        "PING"
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Ping(args.first().cloned()))
    }
}

/// ECHO command - Return the given message
///
/// Syntax: ECHO message
pub struct EchoCommand;

impl Command for EchoCommand {
    fn name(&self) -> &'static str {
        "ECHO"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Echo(args[0].clone()))
    }
}

/// SELECT command - Change the selected database
///
/// Syntax: SELECT index
pub struct SelectCommand;

impl Command for SelectCommand {
    fn name(&self) -> &'static str {
        "SELECT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        let index = parse_int(&args[0])?;
        if index < 0 {
            return Err(CommandError::DbIndexOutOfRange);
        }
        Ok(Op::Select(index as usize))
    }
}

/// AUTH command - Authenticate the connection
///
/// Syntax: AUTH password
pub struct AuthCommand;

impl Command for AuthCommand {
    fn name(&self) -> &'static str {
        "AUTH"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Auth(args[0].clone()))
    }
}

/// QUIT command - Close the connection after replying
///
/// Syntax: QUIT
pub struct QuitCommand;

impl Command for QuitCommand {
    fn name(&self) -> &'static str {
        "QUIT"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn parse(&self, _args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Quit)
    }
}

/// DBSIZE command - Number of keys in the selected database
///
/// Syntax: DBSIZE
pub struct DbSizeCommand;

impl Command for DbSizeCommand {
    fn name(&self) -> &'static str {
        "DBSIZE"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn parse(&self, _args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::DbSize)
    }
}

/// FLUSHDB command - Remove all keys from the selected database
///
/// Syntax: FLUSHDB
pub struct FlushDbCommand;

impl Command for FlushDbCommand {
    fn name(&self) -> &'static str {
        "FLUSHDB"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn parse(&self, _args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::FlushDb)
    }
}

/// In subscribed mode PING answers with a ["pong", message] array
pub(super) fn ping(ctx: &ExecutionContext, message: Option<&Bytes>) -> RespValue {
    if ctx.in_pubsub() {
        let message = message.cloned().unwrap_or_default();
        return RespValue::bulk_array(vec![Bytes::from_static(b"pong"), message]);
    }
    match message {
        Some(message) => RespValue::bulk_string(message.clone()),
        None => RespValue::simple_string("PONG"),
    }
}

pub(super) fn select(ctx: &mut ExecutionContext, store: &Store, index: usize) -> Result<RespValue, CommandError> {
    if index >= store.max_databases() {
        return Err(CommandError::DbIndexOutOfRange);
    }
    ctx.selected_db = index;
    Ok(RespValue::ok())
}

/// Expired keys are dropped first so they are not counted
pub(super) fn dbsize(store: &mut Store, db: usize) -> RespValue {
    store.db(db).sweep_expired();
    RespValue::integer(store.db_len(db) as i64)
}

pub(super) fn flushdb(store: &mut Store, db: usize) -> RespValue {
    store.db(db).flush();
    RespValue::ok()
}

/// AUTH sets the connection flag; nothing else checks it
pub(crate) fn auth(engine: &Engine, ctx: &mut ExecutionContext, password: &Bytes) -> RespValue {
    match engine.check_password(password) {
        Ok(()) => {
            ctx.authenticated = true;
            debug!("connection authenticated");
            RespValue::ok()
        }
        Err(err) => {
            warn!("AUTH failed: {}", err);
            err.into()
        }
    }
}

pub(crate) fn quit(ctx: &mut ExecutionContext) -> RespValue {
    ctx.close();
    RespValue::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::run;
    use crate::config::Config;

    #[test]
    fn test_ping_echo() {
        let mut store = Store::new(16);
        let mut ctx = ExecutionContext::new();

        assert_eq!(run(&mut store, &mut ctx, &PingCommand, &[]), RespValue::simple_string("PONG"));
        assert_eq!(
            run(&mut store, &mut ctx, &PingCommand, &["hi"]),
            RespValue::bulk_string(Bytes::from("hi"))
        );
        assert_eq!(
            run(&mut store, &mut ctx, &EchoCommand, &["hello"]),
            RespValue::bulk_string(Bytes::from("hello"))
        );
    }

    #[test]
    fn test_ping_while_subscribed() {
        let mut ctx = ExecutionContext::new();
        ctx.subscriber_mut().subscribe(Bytes::from("news"));

        let reply = ping(&ctx, None);
        assert_eq!(reply, RespValue::bulk_array(vec![Bytes::from("pong"), Bytes::new()]));
    }

    #[test]
    fn test_select() {
        let mut store = Store::new(4);
        let mut ctx = ExecutionContext::new();

        assert_eq!(run(&mut store, &mut ctx, &SelectCommand, &["3"]), RespValue::ok());
        assert_eq!(ctx.selected_db, 3);

        assert_eq!(
            run(&mut store, &mut ctx, &SelectCommand, &["4"]),
            CommandError::DbIndexOutOfRange.into()
        );
        assert_eq!(
            run(&mut store, &mut ctx, &SelectCommand, &["-1"]),
            CommandError::DbIndexOutOfRange.into()
        );
        assert_eq!(
            run(&mut store, &mut ctx, &SelectCommand, &["one"]),
            CommandError::InvalidInteger.into()
        );
        assert_eq!(ctx.selected_db, 3);
    }

    #[test]
    fn test_dbsize_flushdb() {
        let mut store = Store::new(16);
        let mut ctx = ExecutionContext::new();
        store.db(0).set_string(&Bytes::from("key1"), Bytes::from("value1"));
        store.db(0).set_string(&Bytes::from("key2"), Bytes::from("value2"));
        store.db(1).set_string(&Bytes::from("other"), Bytes::from("value"));

        assert_eq!(run(&mut store, &mut ctx, &DbSizeCommand, &[]), RespValue::integer(2));
        assert_eq!(run(&mut store, &mut ctx, &FlushDbCommand, &[]), RespValue::ok());
        assert_eq!(run(&mut store, &mut ctx, &DbSizeCommand, &[]), RespValue::integer(0));
        assert_eq!(store.db_len(1), 1);
    }

    #[test]
    fn test_auth() {
        let config = Config {
            requirepass: Some("secret".to_string()),
            ..Config::default()
        };
        let engine = Engine::new(&config);
        let mut ctx = ExecutionContext::new();

        let reply = auth(&engine, &mut ctx, &Bytes::from("wrong"));
        assert_eq!(reply, CommandError::InvalidPassword.into());
        assert!(!ctx.authenticated);

        assert_eq!(auth(&engine, &mut ctx, &Bytes::from("secret")), RespValue::ok());
        assert!(ctx.authenticated);
    }

    #[test]
    fn test_quit_marks_closing() {
        let mut ctx = ExecutionContext::new();
        assert_eq!(quit(&mut ctx), RespValue::ok());
        assert!(ctx.is_closing());
    }
}
