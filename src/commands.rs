/// Command palette entries and autocomplete

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  /// Argument hint, shown after the name
  pub usage: &'static str,
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "escrow",
    aliases: &["e", "ledger"],
    usage: "",
    description: "Escrow accounts and transactions",
  },
  Command {
    name: "support",
    aliases: &["s", "desk"],
    usage: "",
    description: "Support desk snapshot",
  },
  Command {
    name: "workspace",
    aliases: &["w", "ws"],
    usage: "<slug|id>",
    description: "Switch the escrow workspace",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "",
    description: "Exit agency-desk",
  },
];

/// A submitted palette line, split into the command word and its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub name: String,
  pub arg: Option<String>,
}

impl Invocation {
  /// Resolve a line, preferring the highlighted suggestion for the command word.
  pub fn resolve(line: &str, selected: usize) -> Option<Self> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
      Some((word, rest)) => (word, Some(rest.trim())),
      None => (line, None),
    };
    let suggestions = get_suggestions(word);
    let name = match suggestions.get(selected) {
      Some(cmd) => cmd.name.to_string(),
      None if word.is_empty() => return None,
      None => word.to_lowercase(),
    };
    Some(Self {
      name,
      arg: rest.filter(|r| !r.is_empty()).map(str::to_string),
    })
  }
}

/// Get autocomplete suggestions for the command word of `input`
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let word = input.split_whitespace().next().unwrap_or("").to_lowercase();

  if word.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &word).map(|rank| (cmd, rank)))
    .collect();

  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better: exact, alias, prefix, alias prefix, substring.
fn match_rank(cmd: &Command, word: &str) -> Option<u32> {
  if cmd.name == word {
    Some(0)
  } else if cmd.aliases.contains(&word) {
    Some(1)
  } else if cmd.name.starts_with(word) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(word)) {
    Some(3)
  } else if cmd.name.contains(word) || cmd.aliases.iter().any(|a| a.contains(word)) {
    Some(4)
  } else {
    None
  }
}
