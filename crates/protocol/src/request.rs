//! Low-level capture request descriptors.
//!
//! A [`CaptureRequestBuilder`] accumulates parameters and output targets and
//! is finalized into an immutable [`CaptureRequest`] right before the batch
//! goes to the device.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys::Key;
use crate::types::{RequestTemplate, Surface, Tag};

/// Mutable request descriptor.
///
/// Parameters are not validated here; the device rejects what it does not
/// support when the batch is submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequestBuilder {
	template: RequestTemplate,
	params: BTreeMap<String, Value>,
	targets: Vec<Surface>,
	#[serde(skip_serializing_if = "Option::is_none")]
	tag: Option<Tag>,
}

impl CaptureRequestBuilder {
	pub fn new(template: RequestTemplate) -> Self {
		Self {
			template,
			..Self::default()
		}
	}

	/// Stores `value` under `key`, replacing any earlier value.
	pub fn set<T: Serialize>(&mut self, key: Key<T>, value: T) -> Result<(), serde_json::Error> {
		self.params.insert(key.name().to_string(), serde_json::to_value(value)?);
		Ok(())
	}

	pub fn get<T: DeserializeOwned>(&self, key: Key<T>) -> Option<T> {
		lookup(&self.params, key)
	}

	pub fn add_target(&mut self, surface: Surface) {
		self.targets.push(surface);
	}

	/// Overwrites the correlation tag.
	pub fn set_tag(&mut self, tag: Tag) {
		self.tag = Some(tag);
	}

	pub fn template(&self) -> RequestTemplate {
		self.template
	}

	pub fn targets(&self) -> &[Surface] {
		&self.targets
	}

	pub fn build(&self) -> CaptureRequest {
		CaptureRequest {
			template: self.template,
			params: self.params.clone(),
			targets: self.targets.clone(),
			tag: self.tag,
		}
	}
}

/// Immutable request as submitted to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
	template: RequestTemplate,
	params: BTreeMap<String, Value>,
	targets: Vec<Surface>,
	#[serde(skip_serializing_if = "Option::is_none")]
	tag: Option<Tag>,
}

impl CaptureRequest {
	pub fn template(&self) -> RequestTemplate {
		self.template
	}

	pub fn get<T: DeserializeOwned>(&self, key: Key<T>) -> Option<T> {
		lookup(&self.params, key)
	}

	pub fn params(&self) -> &BTreeMap<String, Value> {
		&self.params
	}

	pub fn targets(&self) -> &[Surface] {
		&self.targets
	}

	pub fn tag(&self) -> Option<Tag> {
		self.tag
	}
}

pub(crate) fn lookup<T: DeserializeOwned>(values: &BTreeMap<String, Value>, key: Key<T>) -> Option<T> {
	values.get(key.name()).and_then(|value| T::deserialize(value).ok())
}
