use crate::error::Error;
use crate::log::info;
use crate::pagination::{fetch_all, Page};
use aws_sdk_sfn::Client;
use serde::Serialize;
use serde_json::{json, Value};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A state machine's name and ARN as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachineRef {
    pub name: String,
    pub arn: String,
}

/// Step Functions convenience wrapper
#[derive(Debug, Clone)]
pub struct StepFunctions {
    client: Client,
}

impl StepFunctions {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }

    /// Create a state machine from an Amazon States Language document and
    /// return its ARN
    #[cfg_attr(feature = "tracing", instrument(skip(self, definition)))]
    pub async fn create_state_machine(
        &self,
        name: &str,
        definition: &Value,
        role_arn: &str,
    ) -> Result<String, Error> {
        let output = self
            .client
            .create_state_machine()
            .name(name)
            .definition(serde_json::to_string(definition)?)
            .role_arn(role_arn)
            .send()
            .await
            .map_err(|e| Error::StepFunctions(e.to_string()))?;

        let arn = output.state_machine_arn().to_string();
        info!("State machine {} created with arn {}", name, arn);
        Ok(arn)
    }

    /// Every state machine in the account and region
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn list_state_machines(&self) -> Result<Vec<StateMachineRef>, Error> {
        fetch_all(&(), move |_, next_token: Option<String>| async move {
            let output = self
                .client
                .list_state_machines()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| Error::StepFunctions(e.to_string()))?;

            let machines = output
                .state_machines()
                .iter()
                .map(|machine| StateMachineRef {
                    name: machine.name().to_string(),
                    arn: machine.state_machine_arn().to_string(),
                })
                .collect();

            Ok::<_, Error>(Page::new(machines, output.next_token))
        })
        .await
    }

    /// ARN of the state machine called `name`, if there is one
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn get_state_machine(&self, name: &str) -> Result<Option<String>, Error> {
        let machines = self.list_state_machines().await?;

        Ok(machines
            .into_iter()
            .find(|machine| machine.name == name)
            .map(|machine| machine.arn))
    }

    /// Start an execution with JSON-serialised input and return its ARN
    #[cfg_attr(feature = "tracing", instrument(skip(self, input)))]
    pub async fn create_execution<I>(&self, state_machine_arn: &str, input: &I) -> Result<String, Error>
    where
        I: Serialize + ?Sized,
    {
        let output = self
            .client
            .start_execution()
            .state_machine_arn(state_machine_arn)
            .input(serde_json::to_string(input)?)
            .send()
            .await
            .map_err(|e| Error::StepFunctions(e.to_string()))?;

        Ok(output.execution_arn().to_string())
    }

    /// Create the two-task machine from [`two_task_definition`]
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn dummy_state_machine(
        &self,
        name: &str,
        lambda_1_arn: &str,
        lambda_2_arn: &str,
        role_arn: &str,
    ) -> Result<String, Error> {
        let definition = two_task_definition(lambda_1_arn, lambda_2_arn);
        self.create_state_machine(name, &definition, role_arn).await
    }
}

/// Two Lambda tasks run in sequence, then success
pub fn two_task_definition(lambda_1_arn: &str, lambda_2_arn: &str) -> Value {
    json!({
        "Comment": "A dummy state machine",
        "StartAt": "State1",
        "States": {
            "State1": {
                "Resource": lambda_1_arn,
                "Type": "Task",
                "Next": "State2"
            },
            "State2": {
                "Type": "Task",
                "Resource": lambda_2_arn,
                "Next": "End"
            },
            "End": {
                "Type": "Succeed"
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_task_definition_chains_states() {
        let definition = two_task_definition("arn:lambda:one", "arn:lambda:two");

        assert_eq!(definition["StartAt"], "State1");
        assert_eq!(definition["States"]["State1"]["Resource"], "arn:lambda:one");
        assert_eq!(definition["States"]["State1"]["Next"], "State2");
        assert_eq!(definition["States"]["State2"]["Resource"], "arn:lambda:two");
        assert_eq!(definition["States"]["State2"]["Next"], "End");
        assert_eq!(definition["States"]["End"]["Type"], "Succeed");
    }

    #[test]
    fn test_every_next_state_exists() {
        let definition = two_task_definition("a", "b");
        let states = definition["States"].as_object().unwrap();

        for state in states.values() {
            if let Some(next) = state.get("Next").and_then(Value::as_str) {
                assert!(states.contains_key(next), "missing state {next}");
            }
        }
    }
}
