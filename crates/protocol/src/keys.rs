//! Typed parameter and metadata keys.
//!
//! A [`Key`] names an entry in a request's parameter map or a result's
//! metadata map and fixes the Rust type stored under that name. Values are
//! kept as JSON so the device layer does not need to know every type.

use std::fmt;
use std::marker::PhantomData;

/// Name of a request parameter or result field, typed by its value.
pub struct Key<T> {
	name: &'static str,
	_value: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
	pub const fn new(name: &'static str) -> Self {
		Self { name, _value: PhantomData }
	}

	pub const fn name(&self) -> &'static str {
		self.name
	}
}

impl<T> Clone for Key<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for Key<T> {}

impl<T> PartialEq for Key<T> {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
	}
}

impl<T> Eq for Key<T> {}

impl<T> fmt::Debug for Key<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Key").field(&self.name).finish()
	}
}

pub const CONTROL_MODE: Key<i32> = Key::new("android.control.mode");
pub const CONTROL_AE_MODE: Key<i32> = Key::new("android.control.aeMode");
pub const CONTROL_AE_PRECAPTURE_TRIGGER: Key<i32> = Key::new("android.control.aePrecaptureTrigger");
pub const CONTROL_AE_STATE: Key<i32> = Key::new("android.control.aeState");
pub const CONTROL_AF_MODE: Key<i32> = Key::new("android.control.afMode");
pub const CONTROL_AF_TRIGGER: Key<i32> = Key::new("android.control.afTrigger");
pub const CONTROL_AF_STATE: Key<i32> = Key::new("android.control.afState");
pub const CONTROL_CAPTURE_INTENT: Key<i32> = Key::new("android.control.captureIntent");
pub const FLASH_MODE: Key<i32> = Key::new("android.flash.mode");
pub const LENS_FOCUS_DISTANCE: Key<f32> = Key::new("android.lens.focusDistance");
pub const SCALER_CROP_REGION: Key<[i32; 4]> = Key::new("android.scaler.cropRegion");
pub const SENSOR_TIMESTAMP: Key<i64> = Key::new("android.sensor.timestamp");
pub const JPEG_QUALITY: Key<u8> = Key::new("android.jpeg.quality");

/// Values for [`CONTROL_AF_TRIGGER`].
pub mod af_trigger {
	pub const IDLE: i32 = 0;
	pub const START: i32 = 1;
	pub const CANCEL: i32 = 2;
}

/// Values for [`CONTROL_AF_MODE`].
pub mod af_mode {
	pub const OFF: i32 = 0;
	pub const AUTO: i32 = 1;
	pub const CONTINUOUS_PICTURE: i32 = 4;
}

/// Values for [`CONTROL_AF_STATE`].
pub mod af_state {
	pub const INACTIVE: i32 = 0;
	pub const PASSIVE_SCAN: i32 = 1;
	pub const PASSIVE_FOCUSED: i32 = 2;
	pub const ACTIVE_SCAN: i32 = 3;
	pub const FOCUSED_LOCKED: i32 = 4;
	pub const NOT_FOCUSED_LOCKED: i32 = 5;
}
