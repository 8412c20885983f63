use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "display this text.")]
    Help,
    #[command(description = "start the bot.")]
    Start,
}

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub enum AdminCommand {
    #[command(description = "start capturing a broadcast message.")]
    Broadcast,
    #[command(description = "discard the pending broadcast draft.")]
    Cancel,
    #[command(description = "fetch the latest delivery log.")]
    GetLog,
    #[command(description = "recompute the summary of a log: /logsummary [file]")]
    LogSummary { file: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_commands_parse() {
        assert!(matches!(
            AdminCommand::parse("/broadcast", "testbot"),
            Ok(AdminCommand::Broadcast)
        ));
        assert!(matches!(
            AdminCommand::parse("/cancel", "testbot"),
            Ok(AdminCommand::Cancel)
        ));
        match AdminCommand::parse("/logsummary broadcast_log_20260830_120000.csv", "testbot") {
            Ok(AdminCommand::LogSummary { file }) => {
                assert_eq!(file, "broadcast_log_20260830_120000.csv");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
