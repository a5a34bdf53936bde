//! Sandbox backend routes

use warp::Filter;

use crate::infrastructure::http::handlers::{
    handle_checkout, handle_get_order, handle_mark_paid, handle_payment_check, handle_payment_create,
    handle_payment_status, SandboxState,
};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub struct PaymentsRoutes;

impl PaymentsRoutes {
    pub fn create_routes(
        state: SandboxState,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let checkout = warp::path("api")
            .and(warp::path("checkout"))
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::header::optional::<String>("authorization"))
            .and(Self::with_state(state.clone()))
            .and_then(handle_checkout);

        let create = warp::path("api")
            .and(warp::path("payment"))
            .and(warp::path("create"))
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and(warp::header::optional::<String>("authorization"))
            .and(Self::with_state(state.clone()))
            .and_then(handle_payment_create);

        let status = warp::path("api")
            .and(warp::path("payment"))
            .and(warp::path("status"))
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::header::optional::<String>("authorization"))
            .and(Self::with_state(state.clone()))
            .and_then(handle_payment_status);

        let check = warp::path("api")
            .and(warp::path("payment"))
            .and(warp::path("check"))
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::header::optional::<String>("authorization"))
            .and(Self::with_state(state.clone()))
            .and_then(handle_payment_check);

        let pay = warp::path("api")
            .and(warp::path("sandbox"))
            .and(warp::path("orders"))
            .and(warp::path::param::<String>())
            .and(warp::path("pay"))
            .and(warp::path::end())
            .and(warp::post())
            .and(Self::with_state(state.clone()))
            .and_then(handle_mark_paid);

        let order = warp::path("api")
            .and(warp::path("sandbox"))
            .and(warp::path("orders"))
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::get())
            .and(Self::with_state(state))
            .and_then(handle_get_order);

        checkout.or(create).or(status).or(check).or(pay).or(order)
    }

    fn with_state(
        state: SandboxState,
    ) -> impl Filter<Extract = (SandboxState,), Error = std::convert::Infallible> + Clone {
        warp::any().map(move || state.clone())
    }
}
