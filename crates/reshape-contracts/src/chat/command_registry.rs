#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    /// Key the remainder of the line is stored under, if any.
    pub arg_key: Option<&'static str>,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "connect",
        action: "connect_wallet",
        arg_key: Some("address"),
    },
    CommandSpec {
        command: "image",
        action: "generate_image",
        arg_key: Some("prompt"),
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "upload",
    action: "upload",
    arg_key: Some("path"),
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
        arg_key: None,
    },
    CommandSpec {
        command: "tools",
        action: "list_tools",
        arg_key: None,
    },
    CommandSpec {
        command: "status",
        action: "status",
        arg_key: None,
    },
    CommandSpec {
        command: "disconnect",
        action: "disconnect_wallet",
        arg_key: None,
    },
    CommandSpec {
        command: "clear_image",
        action: "clear_image",
        arg_key: None,
    },
    CommandSpec {
        command: "mint",
        action: "confirm_mint",
        arg_key: None,
    },
    CommandSpec {
        command: "retry_mint",
        action: "retry_mint",
        arg_key: None,
    },
    CommandSpec {
        command: "dismiss",
        action: "dismiss_mint",
        arg_key: None,
    },
    CommandSpec {
        command: "retry",
        action: "retry_chat",
        arg_key: None,
    },
    CommandSpec {
        command: "quit",
        action: "quit",
        arg_key: None,
    },
    CommandSpec {
        command: "exit",
        action: "quit",
        arg_key: None,
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/tools",
    "/status",
    "/connect",
    "/disconnect",
    "/image",
    "/clear_image",
    "/upload",
    "/mint",
    "/retry_mint",
    "/dismiss",
    "/retry",
    "/quit",
];
