mod handler;
pub mod model;

pub use handler::{
    create_group, delete_group, get_group_locations, get_group_members, get_incoming_rules,
    get_my_groups, get_outgoing_status, update_location, update_sharing_rule,
};
