use smoke::capture::PanelAction;

/// The keys the control panel cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Text(&'a str),
    Backspace,
    Enter,
    Escape,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Panel(PanelAction),
    Quit,
}

/// Keyboard bindings for the control panel.
///
/// `C` starts a capture, `V` stops it, `S` saves a still image and `N` edits
/// the output name. While editing, typed text is appended, Enter commits and
/// Escape cancels.
#[derive(Debug, Default)]
pub struct PanelInput {
    editing: Option<String>,
}

impl PanelInput {
    pub fn handle(&mut self, key: Key<'_>, current_name: &str) -> Option<Command> {
        match self.editing.as_mut() {
            Some(name) => match key {
                Key::Text(text) => {
                    name.extend(text.chars().filter(|&c| is_file_name_char(c)));
                    None
                }
                Key::Backspace => {
                    name.pop();
                    None
                }
                Key::Enter => self
                    .editing
                    .take()
                    .map(|name| Command::Panel(PanelAction::SetName(name))),
                Key::Escape => {
                    self.editing = None;
                    None
                }
                Key::Other => None,
            },

            None => match key {
                Key::Text(text) => match text.to_ascii_lowercase().as_str() {
                    "c" => Some(Command::Panel(PanelAction::StartCapture)),
                    "v" => Some(Command::Panel(PanelAction::StopCapture)),
                    "s" => Some(Command::Panel(PanelAction::SaveAsImage)),
                    "n" => {
                        self.editing = Some(current_name.to_string());
                        None
                    }
                    _ => None,
                },
                Key::Escape => Some(Command::Quit),
                _ => None,
            },
        }
    }

    pub fn title(&self, name: &str, capturing: bool) -> String {
        let mut title = match &self.editing {
            Some(editing) => format!("Smoke · name: {}▏", editing),
            None => format!("Smoke · {}", name),
        };

        if capturing {
            title.push_str(" · ● REC");
        }

        title
    }
}

// Characters that are safe in a file name on every desktop platform.
fn is_file_name_char(c: char) -> bool {
    !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}
