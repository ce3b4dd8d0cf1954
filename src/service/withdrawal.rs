//! Withdrawal orchestration: the request dialog and its submission.
//!
//! A [`WithdrawalDialog`] holds the form state of one withdrawal request and
//! enforces its lifecycle:
//!
//! ```text
//! Idle → Open → Validating → Submitting → Committed
//!                    │            │
//!                    └────────────┴──→ Open (error attached)
//! ```
//!
//! Opening a dialog always evaluates standard-withdrawal eligibility, so the
//! result is known before the user picks a mode. [`WithdrawalService::submit`]
//! commits the record, the emergency review (if any) and the balance
//! decrement as one [`WriteBatch`] guarded by the balance the dialog was
//! validated against.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::account::{ACCOUNTS_COLLECTION, BALANCE_PATH};
use crate::domain::document::{DEFAULT_MAX_DOCUMENTS, encode_batch};
use crate::domain::eligibility::{WithdrawalFrequency, withdrawal_frequency};
use crate::domain::transaction::{EMERGENCY_REVIEWS_COLLECTION, MIN_EMERGENCY_DESCRIPTION_CHARS};
use crate::domain::{
    Account, AccountId, EligibilityPolicy, EligibilityResult, EmergencyReview, EmergencyType,
    EventBus, LedgerEvent, PaymentMethod, PendingDocument, PreviewRegistry, TransactionRecord,
    timestamp,
};
use crate::error::{SaviumError, ValidationError};
use crate::service::account_service::AccountService;
use crate::service::transaction_log::record_document;
use crate::store::{DocumentStore, WriteBatch};

/// Withdrawal flavour chosen in the dialog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMode {
    /// Policy-gated withdrawal.
    #[default]
    Standard,
    /// Reviewed withdrawal that bypasses the eligibility policy.
    Emergency,
}

/// Lifecycle state of a [`WithdrawalDialog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// Not open.
    Idle,
    /// Accepting edits.
    Open,
    /// Running field validation.
    Validating,
    /// Committing; edits and close are refused.
    Submitting,
    /// The request was committed; the form has been reset.
    Committed,
}

/// Emergency part of a validated submission.
#[derive(Debug, Clone)]
pub struct EmergencyPlan {
    /// Selected category.
    pub emergency_type: EmergencyType,
    /// Justification text.
    pub description: String,
    /// Documents to encode.
    pub documents: Vec<PendingDocument>,
}

/// Everything a validated dialog hands to the commit step.
#[derive(Debug, Clone)]
pub struct SubmissionPlan {
    /// Requesting account snapshot taken when the dialog opened.
    pub account: Account,
    /// Amount to withdraw.
    pub amount: f64,
    /// Payout rail.
    pub payment_method: PaymentMethod,
    /// Present for emergency requests.
    pub emergency: Option<EmergencyPlan>,
}

/// Result of a committed withdrawal.
#[derive(Debug, Clone)]
pub struct WithdrawalReceipt {
    /// The committed record.
    pub record: TransactionRecord,
    /// Balance after the commit.
    pub new_balance: f64,
    /// Promised processing time, in days.
    pub processing_days: u32,
}

/// Eligibility plus withdrawal-frequency classification of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityReport {
    /// Standard-withdrawal eligibility.
    pub result: EligibilityResult,
    /// How recently the account withdrew.
    pub frequency: WithdrawalFrequency,
}

/// Form state and lifecycle of one withdrawal request.
#[derive(Debug)]
pub struct WithdrawalDialog {
    state: DialogState,
    mode: WithdrawalMode,
    account: Option<Account>,
    eligibility: Option<EligibilityResult>,
    amount: String,
    payment_method: PaymentMethod,
    emergency_type: Option<EmergencyType>,
    description: String,
    documents: Vec<PendingDocument>,
    max_documents: usize,
    error: Option<String>,
    previews: Arc<PreviewRegistry>,
}

impl WithdrawalDialog {
    /// Creates a closed dialog whose previews are tracked by `previews`.
    #[must_use]
    pub fn new(previews: Arc<PreviewRegistry>) -> Self {
        Self {
            state: DialogState::Idle,
            mode: WithdrawalMode::Standard,
            account: None,
            eligibility: None,
            amount: String::new(),
            payment_method: PaymentMethod::default(),
            emergency_type: None,
            description: String::new(),
            documents: Vec::new(),
            max_documents: DEFAULT_MAX_DOCUMENTS,
            error: None,
            previews,
        }
    }

    /// Caps the documents one emergency request may carry.
    #[must_use]
    pub fn with_document_limit(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents;
        self
    }

    /// Opens the dialog for `account` with its freshly evaluated eligibility.
    pub fn open(&mut self, account: Account, eligibility: EligibilityResult) {
        self.reset_form();
        self.account = Some(account);
        self.eligibility = Some(eligibility);
        self.state = DialogState::Open;
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DialogState {
        self.state
    }

    /// Selected mode.
    #[must_use]
    pub const fn mode(&self) -> WithdrawalMode {
        self.mode
    }

    /// Eligibility evaluated when the dialog opened.
    #[must_use]
    pub const fn eligibility(&self) -> Option<&EligibilityResult> {
        self.eligibility.as_ref()
    }

    /// User-facing message of the last failed attempt.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Documents queued for an emergency request.
    #[must_use]
    pub fn documents(&self) -> &[PendingDocument] {
        &self.documents
    }

    fn ensure_editable(&self) -> Result<(), SaviumError> {
        match self.state {
            DialogState::Open => Ok(()),
            DialogState::Validating | DialogState::Submitting => {
                Err(ValidationError::SubmissionInProgress.into())
            }
            DialogState::Idle | DialogState::Committed => Err(ValidationError::DialogClosed.into()),
        }
    }

    /// Switches mode. Emergency fields are cleared and their previews released.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is not open or is submitting.
    pub fn set_mode(&mut self, mode: WithdrawalMode) -> Result<(), SaviumError> {
        self.ensure_editable()?;
        if self.mode != mode {
            self.clear_emergency_fields();
            self.mode = mode;
            self.error = None;
        }
        Ok(())
    }

    /// Sets the raw amount input.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is not open or is submitting.
    pub fn set_amount(&mut self, amount: impl Into<String>) -> Result<(), SaviumError> {
        self.ensure_editable()?;
        self.amount = amount.into();
        Ok(())
    }

    /// Sets the payout rail.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is not open or is submitting.
    pub fn set_payment_method(&mut self, method: PaymentMethod) -> Result<(), SaviumError> {
        self.ensure_editable()?;
        self.payment_method = method;
        Ok(())
    }

    /// Selects the emergency category.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is not open or is submitting.
    pub fn set_emergency_type(&mut self, emergency_type: EmergencyType) -> Result<(), SaviumError> {
        self.ensure_editable()?;
        self.emergency_type = Some(emergency_type);
        Ok(())
    }

    /// Sets the emergency description.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is not open or is submitting.
    pub fn set_description(&mut self, description: impl Into<String>) -> Result<(), SaviumError> {
        self.ensure_editable()?;
        self.description = description.into();
        Ok(())
    }

    /// Queues a supporting document, creating a preview for images.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is not open or is submitting.
    pub fn attach(&mut self, mut document: PendingDocument) -> Result<(), SaviumError> {
        self.ensure_editable()?;
        if document.preview.is_none() {
            document.preview = self.previews.create(&document);
        }
        self.documents.push(document);
        Ok(())
    }

    /// Removes a queued document and releases its preview.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is not open or is submitting.
    pub fn remove_document(&mut self, index: usize) -> Result<Option<PendingDocument>, SaviumError> {
        self.ensure_editable()?;
        if index >= self.documents.len() {
            return Ok(None);
        }
        let removed = self.documents.remove(index);
        if let Some(id) = removed.preview {
            self.previews.release(id);
        }
        Ok(Some(removed))
    }

    /// Validates the form in order and returns the submission plan.
    ///
    /// Checks, first failure wins: the amount is a positive number; it does
    /// not exceed the balance; standard requests must be eligible; emergency
    /// requests need a category, a long enough description and a document.
    /// A failure is attached to the dialog, which stays open.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&mut self) -> Result<SubmissionPlan, SaviumError> {
        self.ensure_editable()?;
        self.state = DialogState::Validating;
        let result = self.check_fields();
        self.state = DialogState::Open;
        match result {
            Ok(plan) => {
                self.error = None;
                Ok(plan)
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    fn check_fields(&self) -> Result<SubmissionPlan, SaviumError> {
        let account = self
            .account
            .as_ref()
            .ok_or(SaviumError::Validation(ValidationError::DialogClosed))?;

        let amount = self
            .amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or(ValidationError::InvalidAmount)?;

        let available = account.balance();
        if amount > available {
            return Err(SaviumError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let emergency = match self.mode {
            WithdrawalMode::Standard => {
                match &self.eligibility {
                    Some(e) if e.eligible => {}
                    Some(e) => {
                        return Err(SaviumError::IneligibleWithdrawal(
                            e.reason.clone().unwrap_or_default(),
                        ));
                    }
                    None => return Err(ValidationError::DialogClosed.into()),
                }
                None
            }
            WithdrawalMode::Emergency => {
                let emergency_type = self
                    .emergency_type
                    .ok_or(ValidationError::MissingEmergencyType)?;
                let length = self.description.chars().count();
                if length < MIN_EMERGENCY_DESCRIPTION_CHARS {
                    return Err(ValidationError::DescriptionTooShort {
                        length,
                        minimum: MIN_EMERGENCY_DESCRIPTION_CHARS,
                    }
                    .into());
                }
                if self.documents.is_empty() {
                    return Err(ValidationError::NoDocuments.into());
                }
                if self.documents.len() > self.max_documents {
                    return Err(ValidationError::TooManyDocuments {
                        count: self.documents.len(),
                        maximum: self.max_documents,
                    }
                    .into());
                }
                Some(EmergencyPlan {
                    emergency_type,
                    description: self.description.clone(),
                    documents: self.documents.clone(),
                })
            }
        };

        Ok(SubmissionPlan {
            account: account.clone(),
            amount,
            payment_method: self.payment_method,
            emergency,
        })
    }

    /// Validates and moves to `Submitting`.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the dialog stays open.
    pub fn begin_submit(&mut self) -> Result<SubmissionPlan, SaviumError> {
        let plan = self.validate()?;
        self.state = DialogState::Submitting;
        Ok(plan)
    }

    /// Marks the submission committed and resets the form.
    pub fn complete(&mut self) {
        self.reset_form();
        self.state = DialogState::Committed;
    }

    /// Returns a failed submission to `Open` with its user-facing message.
    ///
    /// Previews are released; queued documents stay for a retry.
    pub fn fail(&mut self, error: &SaviumError) {
        self.release_previews();
        self.error = Some(error.user_message());
        self.state = DialogState::Open;
    }

    /// Closes the dialog, discarding form state.
    ///
    /// # Errors
    ///
    /// Refused with [`ValidationError::SubmissionInProgress`] while submitting.
    pub fn close(&mut self) -> Result<(), SaviumError> {
        if matches!(self.state, DialogState::Validating | DialogState::Submitting) {
            return Err(ValidationError::SubmissionInProgress.into());
        }
        self.reset_form();
        self.account = None;
        self.eligibility = None;
        self.state = DialogState::Idle;
        Ok(())
    }

    fn release_previews(&mut self) {
        for doc in &mut self.documents {
            if let Some(id) = doc.preview.take() {
                self.previews.release(id);
            }
        }
    }

    fn clear_emergency_fields(&mut self) {
        self.release_previews();
        self.documents.clear();
        self.emergency_type = None;
        self.description.clear();
    }

    fn reset_form(&mut self) {
        self.clear_emergency_fields();
        self.mode = WithdrawalMode::Standard;
        self.amount.clear();
        self.payment_method = PaymentMethod::default();
        self.error = None;
    }
}

impl Drop for WithdrawalDialog {
    fn drop(&mut self) {
        self.release_previews();
    }
}

/// Opens withdrawal dialogs and commits their submissions.
#[derive(Debug, Clone)]
pub struct WithdrawalService {
    store: Arc<dyn DocumentStore>,
    accounts: AccountService,
    policy: EligibilityPolicy,
    event_bus: EventBus,
    previews: Arc<PreviewRegistry>,
    max_documents: usize,
}

impl WithdrawalService {
    /// Creates a new `WithdrawalService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        policy: EligibilityPolicy,
        event_bus: EventBus,
        previews: Arc<PreviewRegistry>,
    ) -> Self {
        Self {
            accounts: AccountService::new(Arc::clone(&store)),
            store,
            policy,
            event_bus,
            previews,
            max_documents: DEFAULT_MAX_DOCUMENTS,
        }
    }

    /// Caps the documents of the emergency requests this service opens.
    #[must_use]
    pub fn with_document_limit(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents;
        self
    }

    /// Evaluates eligibility and withdrawal frequency for an account now.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::AccountNotFound`] or a store error.
    pub async fn eligibility(&self, account_id: &AccountId) -> Result<EligibilityReport, SaviumError> {
        let account = self.accounts.get_account(account_id).await?;
        let now = timestamp::now();
        Ok(EligibilityReport {
            result: self.policy.evaluate(&account, now),
            frequency: withdrawal_frequency(&account, now),
        })
    }

    /// Opens a dialog for an account, evaluating standard eligibility.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::AccountNotFound`] or a store error.
    pub async fn open(&self, account_id: &AccountId) -> Result<WithdrawalDialog, SaviumError> {
        let account = self.accounts.get_account(account_id).await?;
        let eligibility = self.policy.evaluate(&account, timestamp::now());
        tracing::debug!(
            %account_id,
            eligible = eligibility.eligible,
            "withdrawal dialog opened"
        );
        let mut dialog = WithdrawalDialog::new(Arc::clone(&self.previews))
            .with_document_limit(self.max_documents);
        dialog.open(account, eligibility);
        Ok(dialog)
    }

    /// Validates and commits the dialog's request.
    ///
    /// On success the dialog is `Committed`; on failure it returns to `Open`
    /// with the user-facing error attached. Previews are released either way.
    ///
    /// # Errors
    ///
    /// Returns the validation failure, [`SaviumError::FileTooLarge`],
    /// [`SaviumError::Conflict`] when the balance changed since the dialog
    /// opened, or a store error.
    pub async fn submit(
        &self,
        dialog: &mut WithdrawalDialog,
    ) -> Result<WithdrawalReceipt, SaviumError> {
        let plan = dialog.begin_submit()?;
        match self.commit(plan).await {
            Ok(receipt) => {
                dialog.complete();
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "withdrawal submission failed");
                dialog.fail(&e);
                Err(e)
            }
        }
    }

    async fn commit(&self, plan: SubmissionPlan) -> Result<WithdrawalReceipt, SaviumError> {
        let SubmissionPlan {
            account,
            amount,
            payment_method,
            emergency,
        } = plan;
        let now = timestamp::now();

        let (record, review) = match emergency {
            Some(plan) => {
                let documents = encode_batch(&plan.documents, |progress| {
                    tracing::debug!(account_id = %account.id, progress, "encoding documents");
                })?;
                let record = TransactionRecord::emergency_withdrawal(
                    account.id.clone(),
                    amount,
                    payment_method,
                    plan.emergency_type,
                    plan.description,
                    documents,
                    now,
                )?;
                let review = EmergencyReview::for_record(&record, &account.name, &account.email);
                (record, review)
            }
            None => (
                TransactionRecord::withdrawal(account.id.clone(), amount, payment_method, now),
                None,
            ),
        };

        let expected_balance = account.balance();
        let new_balance = expected_balance - amount;
        let record_id = record.id.to_string();

        let mut batch = WriteBatch::new()
            .require(ACCOUNTS_COLLECTION, account.id.as_str(), BALANCE_PATH, expected_balance)
            .set(record.kind.collection(), record_id.as_str(), record_document(&record)?);
        if let Some(review) = &review {
            let data = serde_json::to_value(review)
                .map_err(|e| SaviumError::Internal(format!("review encoding: {e}")))?;
            batch = batch.set(EMERGENCY_REVIEWS_COLLECTION, record_id.as_str(), data);
        }
        batch = batch.update(
            ACCOUNTS_COLLECTION,
            account.id.as_str(),
            vec![
                (BALANCE_PATH.to_string(), json!(new_balance)),
                (
                    "financialInfo.lastWithdrawalAt".to_string(),
                    json!(timestamp::format(&now)),
                ),
                ("financialInfo.lastWithdrawalAmount".to_string(), json!(amount)),
            ],
        );

        self.store.commit(batch).await?;

        let event = match &record.emergency {
            Some(details) => LedgerEvent::EmergencyRequestFiled {
                account_id: account.id.clone(),
                record_id: record.id,
                amount,
                emergency_type: details.emergency_type,
                priority: details.priority,
                review_deadline: details.review_deadline,
                new_balance,
                timestamp: now,
            },
            None => LedgerEvent::WithdrawalCommitted {
                account_id: account.id.clone(),
                record_id: record.id,
                amount,
                status: record.status,
                new_balance,
                timestamp: now,
            },
        };
        let _ = self.event_bus.publish(event);

        tracing::info!(
            account_id = %account.id,
            record_id = %record.id,
            kind = %record.kind,
            amount,
            new_balance,
            "withdrawal committed"
        );

        Ok(WithdrawalReceipt {
            record,
            new_balance,
            processing_days: self.policy.processing_days,
        })
    }
}
