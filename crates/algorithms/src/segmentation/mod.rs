//! Connected-component segmentation of boolean masks
//!
//! Components are stored in an arena: a label grid plus one
//! [`Component`] per label owning its pixel list.

mod components;

pub use components::{
    label_components, remove_small_objects, BoundingBox, Component, Components, Connectivity,
};
