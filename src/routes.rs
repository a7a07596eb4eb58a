// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        admin, attempts, auth, fee_settings, messages, payments, profile, students, subjects,
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Multipart framing on top of the receipt itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Assembles the main application router.
///
/// * Public: `/api/auth`.
/// * Authenticated: profile, subjects, quiz attempts, payments, messages, fee settings.
/// * Admin: `/api/admin/*`, behind both auth and admin middleware.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let subject_routes = Router::new()
        .route("/", get(subjects::list_my_subjects))
        .route("/available", get(subjects::list_available_subjects))
        .route("/{id}", get(subjects::get_subject));

    let quiz_routes = Router::new()
        .route("/{id}/attempts", get(attempts::list_attempts))
        .route(
            "/{id}/attempt",
            post(attempts::start_attempt).delete(attempts::abandon_attempt),
        )
        .route("/{id}/attempt/answers", put(attempts::record_answer))
        .route("/{id}/attempt/submit", post(attempts::submit_attempt));

    let payment_routes = Router::new()
        .route(
            "/",
            get(payments::list_my_payments).post(payments::create_payment),
        )
        .route("/{id}/receipt", get(payments::get_receipt))
        .route(
            "/receipts",
            post(payments::upload_receipt).layer(DefaultBodyLimit::max(
                state.config.max_receipt_bytes + UPLOAD_OVERHEAD_BYTES,
            )),
        );

    let user_routes = Router::new()
        .route("/api/me", get(profile::get_me).put(profile::update_me))
        .nest("/api/subjects", subject_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/payments", payment_routes)
        .route(
            "/api/messages",
            get(messages::list_my_messages).post(messages::send_message),
        )
        .route("/api/fee-settings", get(fee_settings::get_fee_settings))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route(
            "/subjects",
            get(admin::list_subjects).post(admin::create_subject),
        )
        .route(
            "/subjects/{id}",
            put(admin::update_subject).delete(admin::delete_subject),
        )
        .route("/subjects/{id}/videos", get(admin::list_videos))
        .route("/subjects/{id}/quizzes", get(admin::list_quizzes))
        .route("/videos", post(admin::create_video))
        .route(
            "/videos/{id}",
            put(admin::update_video).delete(admin::delete_video),
        )
        .route("/quizzes", post(admin::create_quiz))
        .route(
            "/quizzes/{id}",
            put(admin::update_quiz).delete(admin::delete_quiz),
        )
        .route(
            "/quizzes/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/students", get(students::list_students))
        .route("/students/{id}", put(students::update_student))
        .route(
            "/access",
            get(students::list_access).post(students::grant_access),
        )
        .route(
            "/access/{student_id}/{subject_id}",
            delete(students::revoke_access),
        )
        .route("/payments", get(payments::admin_list_payments))
        .route("/payments/reconcile", post(payments::reconcile_payments))
        .route("/payments/{id}/decision", post(payments::decide_payment))
        .route("/payments/{id}/receipt", get(payments::get_receipt))
        .route(
            "/payments/{id}/ensure-access",
            post(payments::ensure_payment_access),
        )
        .route("/quiz-results", get(students::list_quiz_results))
        .route("/messages", get(messages::list_conversations))
        .route(
            "/messages/{student_id}",
            get(messages::get_conversation)
                .post(messages::reply)
                .delete(messages::delete_conversation),
        )
        .route("/fee-settings", put(fee_settings::update_fee_settings))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(user_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
