// Generated by build.rs (feature `grpc`)

pub mod common {
    include!("market.common.rs");
}

pub mod taxonomy {
    include!("market.taxonomy.rs");
}

pub mod moderation {
    include!("market.moderation.rs");
}

pub mod reports {
    include!("market.reports.rs");
}

pub mod users {
    include!("market.users.rs");
}

pub mod health {
    include!("grpc.health.v1.rs");
}
