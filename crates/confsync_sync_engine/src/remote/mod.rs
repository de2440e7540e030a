//! Remote side: API mappers, state loader, ticket provider and the remote
//! unit of work.

mod loader;
mod mapper;
mod requests;
mod ticket;
mod uow;

pub use loader::{link_remote_variables, load_remote_state};
pub use mapper::{
    branch_from_api, branch_to_api, config_from_api, config_to_api, row_to_api,
    SHARED_CODE_ID_KEY, VARIABLES_ID_KEY,
};
pub use requests::{run_requests, Request};
pub use ticket::{Ticket, TicketProvider};
pub use uow::{RemoteUnitOfWork, ALL_FIELDS};
