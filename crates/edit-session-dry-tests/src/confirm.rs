// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted confirmation dialogs implementing [`ConfirmPort`].

use edit_session_core::guard::{DeletePrompt, LeaveChoice, LeavePrompt};
use edit_session_core::ports::ConfirmPort;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Answers leave and delete prompts from a script and records every prompt.
///
/// Leave answers are consumed in order; once the script runs out the
/// answer is [`LeaveChoice::Cancel`]. Delete prompts are declined unless
/// [`ScriptedConfirm::confirming_delete`] was set.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConfirm {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    leave_script: VecDeque<LeaveChoice>,
    delete_answer: bool,
    leave_prompts: Vec<LeavePrompt>,
    delete_prompts: Vec<DeletePrompt>,
}

impl ScriptedConfirm {
    /// Port that cancels everything.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the next leave answer.
    pub fn answering(self, choice: LeaveChoice) -> Self {
        self.lock().leave_script.push_back(choice);
        self
    }

    /// Answer delete prompts with `confirm`.
    pub fn confirming_delete(self, confirm: bool) -> Self {
        self.lock().delete_answer = confirm;
        self
    }

    /// Leave prompts shown so far.
    pub fn leave_prompts(&self) -> Vec<LeavePrompt> {
        self.lock().leave_prompts.clone()
    }

    /// Delete prompts shown so far.
    pub fn delete_prompts(&self) -> Vec<DeletePrompt> {
        self.lock().delete_prompts.clone()
    }
}

impl ConfirmPort for ScriptedConfirm {
    async fn choose_leave(&self, prompt: &LeavePrompt) -> LeaveChoice {
        let mut inner = self.lock();
        inner.leave_prompts.push(prompt.clone());
        inner.leave_script.pop_front().unwrap_or(LeaveChoice::Cancel)
    }

    async fn confirm_delete(&self, prompt: &DeletePrompt) -> bool {
        let mut inner = self.lock();
        inner.delete_prompts.push(prompt.clone());
        inner.delete_answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edit_session_core::value::RecordId;

    fn leave() -> LeavePrompt {
        LeavePrompt {
            entity: "project".into(),
            target: "/projects".into(),
            dirty_fields: vec!["project_title".into()],
        }
    }

    #[tokio::test]
    async fn script_runs_in_order_then_cancels() {
        let confirm = ScriptedConfirm::new()
            .answering(LeaveChoice::Discard)
            .answering(LeaveChoice::SaveAndLeave);
        assert_eq!(confirm.choose_leave(&leave()).await, LeaveChoice::Discard);
        assert_eq!(confirm.choose_leave(&leave()).await, LeaveChoice::SaveAndLeave);
        assert_eq!(confirm.choose_leave(&leave()).await, LeaveChoice::Cancel);
        assert_eq!(confirm.leave_prompts().len(), 3);
    }

    #[tokio::test]
    async fn delete_is_declined_by_default() {
        let prompt = DeletePrompt {
            entity: "blog".into(),
            id: RecordId::Num(5),
        };
        assert!(!ScriptedConfirm::new().confirm_delete(&prompt).await);
        let yes = ScriptedConfirm::new().confirming_delete(true);
        assert!(yes.confirm_delete(&prompt).await);
        assert_eq!(yes.delete_prompts(), vec![prompt]);
    }
}
