#![allow(dead_code)]

use postbot_server::messaging::UserId;

pub const APPROVER: UserId = 1001;
pub const STRANGER: UserId = 2002;

pub const TOPIC: &str = "Protein";
pub const IMAGE_PATH: &str = "/srv/images/2025-03-14/cover.jpg";

/// Text the fake generator produces for [`TOPIC`].
pub const GENERATED_TEXT: &str = "Post about Protein";
