//! Script domain facade.
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::{Result, Session, Target};
//!
//! # async fn example(session: &Session) -> Result<()> {
//! let value = session
//!     .script()
//!     .evaluate("document.title", Target::context("ctx-1"), false)
//!     .await?
//!     .into_result()?;
//! println!("{:?}", value.as_str());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::broker::Broker;
use crate::error::Result;
use crate::identifiers::{ContextId, PreloadScriptId};
use crate::protocol::ScriptCommand;
use crate::protocol::types::{EvaluateResult, LocalValue, ResultOwnership, Target};

// ============================================================================
// Script
// ============================================================================

#[derive(Deserialize)]
struct AddPreloadScriptResult {
    script: PreloadScriptId,
}

/// Script domain commands.
#[derive(Debug, Clone)]
pub struct Script {
    broker: Broker,
}

impl Script {
    /// Creates a facade over `broker`.
    #[inline]
    #[must_use]
    pub fn new(broker: Broker) -> Self {
        Self { broker }
    }

    /// Evaluates `expression` in `target` (`script.evaluate`).
    ///
    /// A thrown exception is a successful call returning
    /// [`EvaluateResult::Exception`]; use [`EvaluateResult::into_result`] to
    /// turn it into an error.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Broker::send`].
    pub async fn evaluate(
        &self,
        expression: impl Into<String>,
        target: Target,
        await_promise: bool,
    ) -> Result<EvaluateResult> {
        self.broker
            .send(ScriptCommand::Evaluate {
                expression: expression.into(),
                target,
                await_promise,
                result_ownership: None,
            })
            .await
    }

    /// Evaluates `expression`, keeping the result alive as a handle.
    ///
    /// Release the handle with [`Script::disown`].
    ///
    /// # Errors
    ///
    /// Returns any error of [`Broker::send`].
    pub async fn evaluate_owned(
        &self,
        expression: impl Into<String>,
        target: Target,
        await_promise: bool,
    ) -> Result<EvaluateResult> {
        self.broker
            .send(ScriptCommand::Evaluate {
                expression: expression.into(),
                target,
                await_promise,
                result_ownership: Some(ResultOwnership::Root),
            })
            .await
    }

    /// Calls `function_declaration` with `arguments` (`script.callFunction`).
    ///
    /// # Errors
    ///
    /// Returns any error of [`Broker::send`].
    pub async fn call_function(
        &self,
        function_declaration: impl Into<String>,
        target: Target,
        arguments: Vec<LocalValue>,
        await_promise: bool,
    ) -> Result<EvaluateResult> {
        self.broker
            .send(ScriptCommand::CallFunction {
                function_declaration: function_declaration.into(),
                await_promise,
                target,
                arguments: (!arguments.is_empty()).then_some(arguments),
                this: None,
                result_ownership: None,
            })
            .await
    }

    /// Releases handles held by the remote end (`script.disown`).
    ///
    /// # Errors
    ///
    /// Returns any error of [`Broker::send`].
    pub async fn disown(&self, handles: Vec<String>, target: Target) -> Result<()> {
        let _: Value = self
            .broker
            .send(ScriptCommand::Disown { handles, target })
            .await?;
        Ok(())
    }

    /// Installs a script that runs before any page script
    /// (`script.addPreloadScript`).
    ///
    /// # Errors
    ///
    /// Returns any error of [`Broker::send`].
    pub async fn add_preload_script(
        &self,
        function_declaration: impl Into<String>,
        contexts: Option<Vec<ContextId>>,
        sandbox: Option<String>,
    ) -> Result<PreloadScriptId> {
        let result: AddPreloadScriptResult = self
            .broker
            .send(ScriptCommand::AddPreloadScript {
                function_declaration: function_declaration.into(),
                contexts,
                sandbox,
            })
            .await?;
        debug!(script = %result.script, "Preload script added");
        Ok(result.script)
    }

    /// Removes a preload script (`script.removePreloadScript`).
    ///
    /// # Errors
    ///
    /// Returns any error of [`Broker::send`].
    pub async fn remove_preload_script(&self, script: &PreloadScriptId) -> Result<()> {
        let _: Value = self
            .broker
            .send(ScriptCommand::RemovePreloadScript {
                script: script.clone(),
            })
            .await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
