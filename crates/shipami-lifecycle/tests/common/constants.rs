//! Constants shared by lifecycle tests

pub const HOME_REGION: &str = "eu-west-1";
pub const OTHER_REGION: &str = "us-east-1";

pub const MARKETPLACE_ACCOUNT: &str = "679593333241";
pub const MARKETPLACE_ALIAS: &str = "aws-marketplace";
pub const PARTNER_ACCOUNT: &str = "123456789012";

pub const ROOT_DEVICE: &str = "/dev/xvda";
pub const DATA_DEVICE: &str = "/dev/xvdb";

pub const MANAGED: &str = "shipami:managed";
pub const RELEASE: &str = "shipami:release";
pub const COPIED_FROM: &str = "shipami:copied_from";
pub const COPIED_TO: &str = "shipami:copied_to";
