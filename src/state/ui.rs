use std::collections::VecDeque;

/// Presentation tone for a narrative scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStyle {
    Warning,
    Success,
    Info,
    Neutral,
}

/// Port through which story callbacks reach the host's presentation layer.
///
/// `prompt_choice` returning `None` means the host is non-interactive or the
/// player abandoned the prompt; callbacks must treat that as "presented but
/// unresolved" and leave the decision to a later explicit call.
pub trait StoryUi {
    fn present_scene(&mut self, title: &str, paragraphs: &[&str], style: SceneStyle);

    fn prompt_choice(
        &mut self,
        title: &str,
        description: &str,
        choices: &[&str],
    ) -> Option<usize>;
}

/// UI port for headless hosts: scenes are dropped, prompts decline.
#[derive(Debug, Default)]
pub struct HeadlessUi;

impl StoryUi for HeadlessUi {
    fn present_scene(&mut self, _title: &str, _paragraphs: &[&str], _style: SceneStyle) {}

    fn prompt_choice(
        &mut self,
        _title: &str,
        _description: &str,
        _choices: &[&str],
    ) -> Option<usize> {
        None
    }
}

/// UI port with a queued script of answers; used by tests and demo drivers.
///
/// Presented scene titles are recorded so a test can assert what the player
/// was shown. An exhausted script answers `None`.
#[derive(Debug, Default)]
pub struct ScriptedUi {
    answers: VecDeque<Option<usize>>,
    pub scenes: Vec<String>,
    pub prompts: Vec<String>,
}

impl ScriptedUi {
    pub fn new(answers: impl IntoIterator<Item = Option<usize>>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            scenes: Vec::new(),
            prompts: Vec::new(),
        }
    }
}

impl StoryUi for ScriptedUi {
    fn present_scene(&mut self, title: &str, _paragraphs: &[&str], _style: SceneStyle) {
        self.scenes.push(title.to_string());
    }

    fn prompt_choice(
        &mut self,
        title: &str,
        _description: &str,
        _choices: &[&str],
    ) -> Option<usize> {
        self.prompts.push(title.to_string());
        self.answers.pop_front().flatten()
    }
}
